//! Error types for profiling and strategy creation.

use tabfuse_classify::ClassifyError;
use tabfuse_common::ExecutorError;
use tabfuse_model::Phase;
use tabfuse_transform::RuleError;
use thiserror::Error;

/// A profiling failure. Never fatal: the affected column or table summary
/// gets a fallback.
#[derive(Debug, Error)]
pub enum ProfilingError {
    #[error("column '{column}' could not be classified after {attempts} attempt(s): {source}")]
    Column {
        column: String,
        attempts: u32,
        #[source]
        source: ClassifyError,
    },

    #[error("column profiling aborted: {0}")]
    Batch(#[source] ExecutorError<ClassifyError>),

    #[error("table summary unavailable: {0}")]
    Table(#[source] ExecutorError<ClassifyError>),
}

impl ProfilingError {
    /// The column concerned, if the failure was specific to one.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Column { column, .. } => Some(column),
            Self::Batch(_) | Self::Table(_) => None,
        }
    }
}

/// Why a single column plan was rejected. Retried by the executor.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("format plan without a transformation rule")]
    MissingRule,

    #[error("invalid transformation rule '{rule}': {source}")]
    Rule {
        rule: String,
        #[source]
        source: RuleError,
    },
}

/// Strategy creation failed; no partial strategy is returned.
#[derive(Debug, Error)]
#[error("mapping strategy failed during {phase}: {source}")]
pub struct StrategyError {
    pub phase: Phase,
    /// Target column whose plan failed, when the batch aborted on one.
    pub column: Option<String>,
    #[source]
    pub source: ExecutorError<PlanError>,
}
