//! Ingestion pipeline.
//!
//! One run takes a source dataset into a target dataset:
//!
//! 1. profile the source columns;
//! 2. plan every target column (identity-weighted columns first);
//! 3. for each source row, derive the Phase 1 values, match them against the
//!    rows the target held before the run, then apply the plans and merge
//!    into the matched row or append a new one.
//!
//! Rows are processed one at a time; the target is only written after the
//! row's match decision.

use std::sync::Arc;

use serde::Serialize;
use tabfuse_classify::Classifier;
use tabfuse_common::ExecutorOptions;
use tabfuse_map::{
    ColumnProfiler, DEFAULT_SAMPLE_ROWS, MappingStrategist, ProfileOutcome, StrategyError,
};
use tabfuse_model::{Dataset, DatasetProfile, MappingStrategy, ModelError, TargetSchema};
use tabfuse_transform::{FailurePolicy, Processor, TransformationError};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::matcher::{EntityMatcher, MatchingError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("failed to prepare transformations: {0}")]
    Setup(#[source] TransformationError),

    #[error("source row {row}: {source}")]
    Matching {
        row: usize,
        #[source]
        source: MatchingError,
    },

    #[error("source row {row}: {source}")]
    Transformation {
        row: usize,
        #[source]
        source: TransformationError,
    },

    #[error("entity matcher setup failed: {0}")]
    Matcher(#[source] MatchingError),

    #[error("target dataset: {0}")]
    Target(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Inserted,
    Merged,
}

/// What happened to one source row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowDecision {
    pub source_row: usize,
    /// Target row written: the matched row, or the appended one.
    pub target_row: usize,
    pub action: RowAction,
    /// Match score, or the best score seen for an insertion.
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionReport {
    pub inserted: usize,
    pub merged: usize,
    /// Source columns that received a fallback profile.
    pub fallback_columns: Vec<String>,
    pub rows: Vec<RowDecision>,
}

#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub dataset: Dataset,
    pub profile: DatasetProfile,
    pub strategy: MappingStrategy,
    pub report: IngestionReport,
}

/// Runs ingestion runs against one classifier.
pub struct Ingestor {
    classifier: Arc<dyn Classifier>,
    options: ExecutorOptions,
    policy: FailurePolicy,
    sample_rows: usize,
}

impl Ingestor {
    pub fn new(classifier: Arc<dyn Classifier>, options: ExecutorOptions) -> Self {
        Self {
            classifier,
            options,
            policy: FailurePolicy::default(),
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    pub fn profile(&self, source: &Dataset, purpose: &str) -> ProfileOutcome {
        ColumnProfiler::new(Arc::clone(&self.classifier), self.options)
            .with_sample_rows(self.sample_rows)
            .profile(source, purpose)
    }

    pub fn plan(&self, schema: &TargetSchema, profile: &DatasetProfile) -> Result<MappingStrategy> {
        Ok(MappingStrategist::new(Arc::clone(&self.classifier), self.options)
            .create_plan(schema, profile)?)
    }

    /// Ingests `source` into `target` and returns the updated dataset.
    pub fn ingest(
        &self,
        schema: &TargetSchema,
        source: &Dataset,
        target: Dataset,
    ) -> Result<IngestionOutcome> {
        self.ingest_with(schema, source, target, |_| {})
    }

    /// Like [`Self::ingest`], calling `on_row` after each source row.
    pub fn ingest_with<F>(
        &self,
        schema: &TargetSchema,
        source: &Dataset,
        mut target: Dataset,
        mut on_row: F,
    ) -> Result<IngestionOutcome>
    where
        F: FnMut(&RowDecision),
    {
        let span = info_span!("ingest", source_rows = source.len(), target_rows = target.len());
        let _guard = span.enter();

        let profile = self.profile(source, schema.purpose()).profile;
        let fallback_columns: Vec<String> = profile
            .columns
            .iter()
            .filter(|entry| entry.profile.is_fallback())
            .map(|entry| entry.name.clone())
            .collect();
        if !fallback_columns.is_empty() {
            warn!(
                fallbacks = fallback_columns.len(),
                "continuing with fallback column profiles"
            );
        }

        let strategy = self.plan(schema, &profile)?;
        let processor = Processor::new(
            schema,
            &strategy,
            source.columns(),
            Arc::clone(&self.classifier),
            self.policy,
        )
        .map_err(PipelineError::Setup)?;
        let matcher = EntityMatcher::new(schema).map_err(PipelineError::Matcher)?;

        for column in schema.column_names() {
            if target.ensure_column(&column)? {
                debug!(column = %column, "added schema column to target");
            }
        }
        let existing_rows = target.len();

        let mut report = IngestionReport {
            fallback_columns,
            ..IngestionReport::default()
        };
        for (index, row) in source.rows().iter().enumerate() {
            let row_span = info_span!("row", index);
            let _row_guard = row_span.enter();

            let entity = processor
                .entity_values(row)
                .map_err(|source| PipelineError::Transformation { row: index, source })?;
            let decision = matcher
                .match_row(&entity, &target.rows()[..existing_rows])
                .map_err(|source| PipelineError::Matching { row: index, source })?;
            let existing = decision.target_row.and_then(|position| target.row(position));
            let values = processor
                .apply(row, &entity, existing)
                .map_err(|source| PipelineError::Transformation { row: index, source })?;

            let record = match decision.target_row {
                Some(position) => {
                    for (column, value) in values.cells {
                        target.set(position, column, value);
                    }
                    report.merged += 1;
                    RowDecision {
                        source_row: index,
                        target_row: position,
                        action: RowAction::Merged,
                        score: decision.score,
                    }
                }
                None => {
                    let position = target.push_row(values);
                    report.inserted += 1;
                    RowDecision {
                        source_row: index,
                        target_row: position,
                        action: RowAction::Inserted,
                        score: decision.score,
                    }
                }
            };
            debug!(
                target_row = record.target_row,
                action = ?record.action,
                score = record.score,
                "row resolved"
            );
            on_row(&record);
            report.rows.push(record);
        }

        info!(
            inserted = report.inserted,
            merged = report.merged,
            rows = target.len(),
            "ingestion finished"
        );
        Ok(IngestionOutcome {
            dataset: target,
            profile,
            strategy,
            report,
        })
    }
}
