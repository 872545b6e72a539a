//! Mapping strategist.
//!
//! Decides one [`TransformationPlan`] per target column in two phases:
//! identity-weighted columns first, then everything else. Each phase runs on
//! the bounded executor and is all-or-nothing; a plan that fails validation
//! is retried like any other failed attempt.

use std::sync::Arc;

use tabfuse_classify::{Classifier, classify_as};
use tabfuse_common::{BoundedExecutor, ExecutorOptions};
use tabfuse_model::{
    ColumnPlan, DatasetProfile, MappingStrategy, Phase, TargetSchema, TransformationPlan,
    TransformationType,
};
use tabfuse_transform::FormatRule;
use tracing::{debug, info, info_span, warn};

use crate::error::{PlanError, StrategyError};
use crate::prompt::{describe_sources, plan_request};

/// Everything a planning worker needs, shared across one run.
#[derive(Debug)]
struct PlanContext {
    schema: TargetSchema,
    sources: String,
    source_columns: Vec<String>,
}

pub struct MappingStrategist {
    classifier: Arc<dyn Classifier>,
    executor: BoundedExecutor,
}

impl MappingStrategist {
    pub fn new(classifier: Arc<dyn Classifier>, options: ExecutorOptions) -> Self {
        Self {
            classifier,
            executor: BoundedExecutor::new(options),
        }
    }

    /// Plans every column of `schema` against the profiled source columns.
    ///
    /// Phase 1 completes before Phase 2 starts. The returned strategy lists
    /// plans in schema order.
    pub fn create_plan(
        &self,
        schema: &TargetSchema,
        profile: &DatasetProfile,
    ) -> Result<MappingStrategy, StrategyError> {
        let context = Arc::new(PlanContext {
            schema: schema.clone(),
            sources: describe_sources(profile),
            source_columns: profile.column_names(),
        });

        let mut planned = Vec::with_capacity(schema.len());
        for phase in [Phase::EntityMatching, Phase::Remaining] {
            planned.extend(self.plan_phase(&context, phase)?);
        }

        let plans = schema
            .columns()
            .iter()
            .filter_map(|column| {
                planned
                    .iter()
                    .position(|entry: &ColumnPlan| entry.column == column.name)
                    .map(|index| planned.swap_remove(index))
            })
            .collect();
        Ok(MappingStrategy { plans })
    }

    fn plan_phase(
        &self,
        context: &Arc<PlanContext>,
        phase: Phase,
    ) -> Result<Vec<ColumnPlan>, StrategyError> {
        let columns: Vec<String> = context
            .schema
            .columns_in_phase(phase)
            .map(|column| column.name.clone())
            .collect();
        if columns.is_empty() {
            debug!(%phase, "no columns to plan");
            return Ok(Vec::new());
        }

        let span = info_span!("plan", %phase, columns = columns.len());
        let _guard = span.enter();

        let classifier = Arc::clone(&self.classifier);
        let worker_context = Arc::clone(context);
        let plans = self
            .executor
            .map(columns.clone(), move |column: &String| {
                plan_column(classifier.as_ref(), &worker_context, column)
            })
            .map_err(|source| StrategyError {
                phase,
                column: source
                    .item_failure()
                    .and_then(|failure| columns.get(failure.index).cloned()),
                source,
            })?;

        info!(%phase, planned = plans.len(), "phase planned");
        Ok(columns
            .into_iter()
            .zip(plans)
            .map(|(column, plan)| ColumnPlan {
                column,
                phase,
                plan,
            })
            .collect())
    }
}

fn plan_column(
    classifier: &dyn Classifier,
    context: &PlanContext,
    column: &str,
) -> Result<TransformationPlan, PlanError> {
    let Some(target) = context.schema.column(column) else {
        return Ok(TransformationPlan::none("column not in schema"));
    };
    let request = plan_request(context.schema.purpose(), &context.sources, target);
    let plan: TransformationPlan = classify_as(classifier, &request)?;
    let plan = validate_plan(plan, &context.source_columns, column)?;
    debug!(
        column,
        transformation = %plan.transformation_type,
        rule = plan.transformation_rule.as_deref().unwrap_or(""),
        "column planned"
    );
    Ok(plan)
}

/// Checks a proposed plan against the source columns.
///
/// Format rules must parse and reference only known columns. Unknown
/// `llm_source_columns` entries are dropped; an emptied list means "all".
pub(crate) fn validate_plan(
    mut plan: TransformationPlan,
    source_columns: &[String],
    column: &str,
) -> Result<TransformationPlan, PlanError> {
    match plan.transformation_type {
        TransformationType::Format => {
            let rule = plan
                .transformation_rule
                .as_deref()
                .map(str::trim)
                .filter(|rule| !rule.is_empty())
                .ok_or(PlanError::MissingRule)?
                .to_string();
            FormatRule::parse_for_columns(&rule, source_columns).map_err(|source| {
                PlanError::Rule {
                    rule: rule.clone(),
                    source,
                }
            })?;
            plan.transformation_rule = Some(rule);
            plan.llm_source_columns = None;
        }
        TransformationType::LlmFormat => {
            plan.transformation_rule = None;
            if let Some(requested) = plan.llm_source_columns.take() {
                let (known, unknown): (Vec<String>, Vec<String>) = requested
                    .into_iter()
                    .partition(|name| source_columns.contains(name));
                if !unknown.is_empty() {
                    warn!(column, ?unknown, "dropping unknown llm source columns");
                }
                plan.llm_source_columns = (!known.is_empty()).then_some(known);
            }
        }
        TransformationType::None => {
            plan.transformation_rule = None;
            plan.llm_source_columns = None;
        }
    }
    Ok(plan)
}
