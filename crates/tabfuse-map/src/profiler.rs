//! Column profiler.
//!
//! Computes statistics for every source column locally, then asks the
//! classifier for each column's kind and purpose on the bounded executor.
//! A column whose classification fails keeps its statistics and gets a
//! fallback profile. Once the columns are done, one more request summarises
//! the table as a whole. Profiling as a whole never fails.

use std::sync::Arc;

use tabfuse_classify::{Classifier, ClassifyError, classify_as};
use tabfuse_common::{BoundedExecutor, ExecutorError, ExecutorOptions};
use tabfuse_model::{
    ColumnKind, ColumnProfile, ColumnStats, Dataset, DatasetProfile, ProfiledColumn,
    QualityAssessment, TableSummary,
};
use tracing::{debug, info, info_span, warn};

use crate::error::ProfilingError;
use crate::prompt::{
    ProfileAnswer, TABLE_REQUEST, TableAnswer, profile_request, table_request,
};
use crate::stats::{compute_stats, heuristic_kind, sample_values};

/// Default number of distinct sample values shown per column.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Lower bound for classifier confidence; 0.0 is reserved for fallbacks.
const MIN_CONFIDENCE: f32 = 0.01;

/// Profiles plus the failures that produced fallback entries.
#[derive(Debug)]
pub struct ProfileOutcome {
    pub profile: DatasetProfile,
    pub failures: Vec<ProfilingError>,
}

impl ProfileOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Local part of a column profile, shipped to an executor worker.
#[derive(Debug, Clone)]
struct ColumnJob {
    name: String,
    stats: ColumnStats,
    samples: Vec<String>,
    hint: ColumnKind,
}

pub struct ColumnProfiler {
    classifier: Arc<dyn Classifier>,
    executor: BoundedExecutor,
    sample_rows: usize,
}

impl ColumnProfiler {
    pub fn new(classifier: Arc<dyn Classifier>, options: ExecutorOptions) -> Self {
        Self {
            classifier,
            executor: BoundedExecutor::new(options),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    /// Sets how many distinct sample values each column carries.
    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    /// Profiles every column of `dataset` in source column order.
    pub fn profile(&self, dataset: &Dataset, dataset_purpose: &str) -> ProfileOutcome {
        let span = info_span!("profile", columns = dataset.columns().len(), rows = dataset.len());
        let _guard = span.enter();

        let jobs: Vec<ColumnJob> = dataset
            .columns()
            .iter()
            .map(|name| {
                let stats = compute_stats(dataset, name);
                ColumnJob {
                    name: name.clone(),
                    stats,
                    samples: sample_values(dataset, name, self.sample_rows),
                    hint: heuristic_kind(dataset, name, &stats),
                }
            })
            .collect();

        let classifier = Arc::clone(&self.classifier);
        let purpose = dataset_purpose.to_string();
        let outcomes = self.executor.map_outcomes(jobs.clone(), move |job: &ColumnJob| {
            let request = profile_request(&purpose, &job.name, &job.stats, &job.samples, job.hint);
            classify_as::<ProfileAnswer, _>(classifier.as_ref(), &request)
        });

        let mut failures = Vec::new();
        let columns = match outcomes {
            Ok(outcomes) => jobs
                .into_iter()
                .zip(outcomes)
                .map(|(job, outcome)| match outcome {
                    Ok(answer) => classified(job, answer),
                    Err(failure) => {
                        warn!(column = %job.name, error = %failure.source, "column profiling failed, using fallback");
                        let profile = fallback(&job, &failure.source);
                        failures.push(ProfilingError::Column {
                            column: job.name.clone(),
                            attempts: failure.attempts,
                            source: failure.source,
                        });
                        ProfiledColumn {
                            name: job.name,
                            profile,
                        }
                    }
                })
                .collect(),
            Err(error) => {
                warn!(error = %error, "column profiling aborted, using fallbacks for every column");
                let reason = error.to_string();
                failures.push(ProfilingError::Batch(error));
                jobs.into_iter()
                    .map(|job| ProfiledColumn {
                        profile: ColumnProfile::fallback(
                            job.stats,
                            job.samples,
                            format!("profiling aborted: {reason}"),
                        ),
                        name: job.name,
                    })
                    .collect()
            }
        };

        let mut profile = DatasetProfile {
            row_count: dataset.len(),
            columns,
            table: TableSummary::default(),
        };
        info!(
            columns = profile.columns.len(),
            fallbacks = failures.len(),
            "profiled source columns"
        );

        profile.table = if profile.columns.iter().all(|entry| entry.profile.is_fallback()) {
            TableSummary::fallback("no column profiles to summarise")
        } else {
            match self.summarize(&profile, dataset_purpose) {
                Ok(table) => {
                    info!(
                        purpose = %table.purpose,
                        source = %table.data_source,
                        entity = %table.primary_entity,
                        "summarised source table"
                    );
                    table
                }
                Err(error) => {
                    warn!(error = %error, "table summary failed, using fallback");
                    let table = TableSummary::fallback(error.to_string());
                    failures.push(error);
                    table
                }
            }
        };
        ProfileOutcome { profile, failures }
    }

    fn summarize(
        &self,
        profile: &DatasetProfile,
        purpose: &str,
    ) -> Result<TableSummary, ProfilingError> {
        let request = table_request(purpose, profile);
        let classifier = Arc::clone(&self.classifier);
        let answer = self
            .executor
            .map(vec![TABLE_REQUEST], move |_| {
                classify_as::<TableAnswer, _>(classifier.as_ref(), &request)
            })
            .map_err(ProfilingError::Table)?
            .pop()
            .ok_or(ProfilingError::Table(ExecutorError::Incomplete {
                total: 1,
                completed: 0,
            }))?;

        let identifier_candidates = answer
            .identifier_candidates
            .into_iter()
            .filter(|name| {
                let known = profile.contains(name);
                if !known {
                    debug!(column = %name, "dropping unknown identifier candidate");
                }
                known
            })
            .collect();
        Ok(TableSummary {
            purpose: answer.table_purpose,
            data_source: answer.data_source,
            primary_entity: answer.primary_entity,
            identifier_candidates,
            quality: QualityAssessment {
                completeness: answer.quality_assessment.completeness,
                consistency: answer.quality_assessment.consistency,
                potential_duplicates: answer.quality_assessment.potential_duplicates,
            },
            reasoning: answer.reasoning,
            confidence: clamp_confidence(answer.confidence),
        })
    }
}

fn clamp_confidence(confidence: Option<f32>) -> f32 {
    confidence
        .filter(|value| value.is_finite())
        .map_or(MIN_CONFIDENCE, |value| value.clamp(MIN_CONFIDENCE, 1.0))
}

fn classified(job: ColumnJob, answer: ProfileAnswer) -> ProfiledColumn {
    let confidence = clamp_confidence(answer.confidence);
    if answer.kind != job.hint {
        debug!(column = %job.name, heuristic = %job.hint, classifier = %answer.kind, "classifier overrode heuristic kind");
    }
    ProfiledColumn {
        profile: ColumnProfile {
            kind: answer.kind,
            purpose: answer.purpose,
            reasoning: answer.reasoning,
            confidence,
            stats: job.stats,
            sample_values: job.samples,
        },
        name: job.name,
    }
}

fn fallback(job: &ColumnJob, error: &ClassifyError) -> ColumnProfile {
    ColumnProfile::fallback(
        job.stats,
        job.samples.clone(),
        format!("classification failed: {error}"),
    )
}
