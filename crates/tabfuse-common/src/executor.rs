//! Bounded concurrent executor.
//!
//! Applies a fallible function to a fixed list of items on a capped worker
//! pool. Every item gets `max_retries + 1` attempts with exponential backoff
//! between them, and results come back in input order regardless of which
//! worker finished first.
//!
//! Two collection modes share one scheduler:
//!
//! - [`BoundedExecutor::map`] is all-or-nothing: the first item that exhausts
//!   its retries aborts the call and pending work is abandoned.
//! - [`BoundedExecutor::map_outcomes`] collects every per-item outcome and
//!   leaves the decision to the caller. Only a batch-level timeout aborts it.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;
use tracing::{debug, warn};

/// Tuning knobs for [`BoundedExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Upper bound on concurrent invocations.
    pub max_workers: usize,
    /// Budget per item; the whole call waits at most `per_item_timeout × items`.
    pub per_item_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff after attempt `n` (0-based) is `backoff_unit × 2^n`.
    pub backoff_unit: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_workers: 5,
            per_item_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// An item that failed on its final attempt.
#[derive(Debug, Error)]
#[error("item {index} ({item}) failed after {attempts} attempt(s): {source}")]
pub struct ItemFailure<E> {
    /// Position of the item in the input.
    pub index: usize,
    /// Debug rendering of the item.
    pub item: String,
    pub attempts: u32,
    /// Error of the last attempt.
    #[source]
    pub source: E,
}

/// Batch-level executor failures.
#[derive(Debug, Error)]
pub enum ExecutorError<E> {
    /// An item exhausted its retries (fail-fast mode only).
    #[error(transparent)]
    Item(ItemFailure<E>),

    /// The aggregate timeout elapsed before every item finished.
    #[error("timed out after {waited:?} with {completed} of {total} item(s) finished")]
    TimedOut {
        total: usize,
        completed: usize,
        waited: Duration,
    },

    /// Workers stopped without reporting every item (a worker panicked).
    #[error("workers stopped with {completed} of {total} item(s) finished")]
    Incomplete { total: usize, completed: usize },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl<E> ExecutorError<E> {
    /// The failing item, when the batch aborted because of one.
    pub fn item_failure(&self) -> Option<&ItemFailure<E>> {
        match self {
            Self::Item(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Delay before retrying after the given 0-based attempt.
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    unit.saturating_mul(factor)
}

/// Per-item outcome returned by [`BoundedExecutor::map_outcomes`].
pub type ItemOutcome<R, E> = Result<R, ItemFailure<E>>;

/// Fixed-size worker pool draining a fixed task list.
#[derive(Debug, Clone, Default)]
pub struct BoundedExecutor {
    options: ExecutorOptions,
}

impl BoundedExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Runs `function` over `items` and returns results in input order.
    ///
    /// The first item that fails all of its attempts aborts the call; results
    /// already computed for other items are discarded.
    pub fn map<T, R, E, F>(&self, items: Vec<T>, function: F) -> Result<Vec<R>, ExecutorError<E>>
    where
        T: Debug + Send + Sync + 'static,
        R: Send + 'static,
        E: std::error::Error + Send + 'static,
        F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
    {
        let outcomes = self.run(items, function, true)?;
        outcomes
            .into_iter()
            .map(|outcome| outcome.map_err(ExecutorError::Item))
            .collect()
    }

    /// Runs `function` over `items` and returns every outcome in input order.
    pub fn map_outcomes<T, R, E, F>(
        &self,
        items: Vec<T>,
        function: F,
    ) -> Result<Vec<ItemOutcome<R, E>>, ExecutorError<E>>
    where
        T: Debug + Send + Sync + 'static,
        R: Send + 'static,
        E: std::error::Error + Send + 'static,
        F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
    {
        self.run(items, function, false)
    }

    fn run<T, R, E, F>(
        &self,
        items: Vec<T>,
        function: F,
        fail_fast: bool,
    ) -> Result<Vec<ItemOutcome<R, E>>, ExecutorError<E>>
    where
        T: Debug + Send + Sync + 'static,
        R: Send + 'static,
        E: std::error::Error + Send + 'static,
        F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let items = Arc::new(items);
        let function = Arc::new(function);
        let cancelled = Arc::new(AtomicBool::new(false));

        let (task_tx, task_rx) = crossbeam_channel::unbounded::<usize>();
        for index in 0..total {
            if task_tx.send(index).is_err() {
                break;
            }
        }
        drop(task_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, ItemOutcome<R, E>)>();
        let workers = self.options.max_workers.clamp(1, total);
        let max_retries = self.options.max_retries;
        let backoff_unit = self.options.backoff_unit;

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let items = Arc::clone(&items);
            let function = Arc::clone(&function);
            let worker_cancelled = Arc::clone(&cancelled);
            let spawned = thread::Builder::new()
                .name(format!("tabfuse-worker-{worker}"))
                .spawn(move || {
                    while let Ok(index) = task_rx.recv() {
                        if worker_cancelled.load(Ordering::Relaxed) {
                            break;
                        }
                        let outcome = attempt_item(
                            index,
                            &items[index],
                            function.as_ref(),
                            max_retries,
                            backoff_unit,
                            &worker_cancelled,
                        );
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    cancelled.store(true, Ordering::Relaxed);
                    return Err(ExecutorError::Spawn(error));
                }
            }
        }
        drop(result_tx);

        let item_count = u32::try_from(total).unwrap_or(u32::MAX);
        let budget = self.options.per_item_timeout.saturating_mul(item_count);
        let started = Instant::now();
        let deadline = started + budget;

        let mut slots: Vec<Option<ItemOutcome<R, E>>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        while completed < total {
            match result_rx.recv_deadline(deadline) {
                Ok((index, outcome)) => {
                    let outcome = match outcome {
                        Err(failure) if fail_fast => {
                            cancelled.store(true, Ordering::Relaxed);
                            return Err(ExecutorError::Item(failure));
                        }
                        other => other,
                    };
                    slots[index] = Some(outcome);
                    completed += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancelled.store(true, Ordering::Relaxed);
                    warn!(total, completed, budget_ms = budget.as_millis() as u64, "executor timed out");
                    return Err(ExecutorError::TimedOut {
                        total,
                        completed,
                        waited: started.elapsed(),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ExecutorError::Incomplete { total, completed });
                }
            }
        }

        for handle in handles {
            // Every item was reported, so workers only have an empty queue left.
            let _ = handle.join();
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(ExecutorError::Incomplete { total, completed })
    }
}

fn attempt_item<T, R, E, F>(
    index: usize,
    item: &T,
    function: &F,
    max_retries: u32,
    backoff_unit: Duration,
    cancelled: &AtomicBool,
) -> ItemOutcome<R, E>
where
    T: Debug,
    E: std::error::Error,
    F: Fn(&T) -> Result<R, E>,
{
    let mut attempt = 0u32;
    loop {
        let started = Instant::now();
        match function(item) {
            Ok(value) => {
                debug!(
                    index,
                    attempts = attempt + 1,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "item completed"
                );
                return Ok(value);
            }
            Err(error) if attempt < max_retries && !cancelled.load(Ordering::Relaxed) => {
                let delay = backoff_delay(backoff_unit, attempt);
                warn!(
                    index,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "item attempt failed, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(error) => {
                return Err(ItemFailure {
                    index,
                    item: format!("{item:?}"),
                    attempts: attempt + 1,
                    source: error,
                });
            }
        }
    }
}
