//! Transformation & merge processor.
//!
//! Executes each target column's plan against one incoming row and, when the
//! row matched an existing entity, resolves the incoming value against the
//! stored one:
//!
//! - identity columns keep a non-empty existing value without deriving a
//!   new one, and only fill gaps;
//! - descriptive columns keep whichever side is non-empty, and ask the
//!   classifier to combine the two when both are present and differ.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabfuse_classify::{Classifier, classify_as};
use tabfuse_common::{normalize_identity, redact_value};
use tabfuse_model::{
    CellValue, ColumnRole, MappingStrategy, Phase, Row, TargetSchema, TransformationPlan,
    TransformationType,
};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransformationError};
use crate::prompt::{ColumnContext, ValueAnswer, derive_request, merge_request};
use crate::rule::FormatRule;
use crate::scalar::coerce_scalar;

/// What to do when a single column's derivation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Propagate the error; the row (and the run) fails.
    #[default]
    Strict,
    /// Log a warning and treat the column as `none`.
    Lenient,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Lenient => f.write_str("lenient"),
        }
    }
}

/// Phase 1 values of one incoming row, keyed by target column.
pub type EntityValues = BTreeMap<String, CellValue>;

#[derive(Debug)]
struct ColumnTask {
    name: String,
    description: String,
    supports_purpose_by: String,
    role: ColumnRole,
    plan: TransformationPlan,
    rule: Option<FormatRule>,
}

/// Applies a mapping strategy to incoming rows.
pub struct Processor {
    purpose: String,
    tasks: Vec<ColumnTask>,
    source_columns: Vec<String>,
    classifier: Arc<dyn Classifier>,
    policy: FailurePolicy,
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("purpose", &self.purpose)
            .field("tasks", &self.tasks)
            .field("source_columns", &self.source_columns)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Binds every target column to its plan and compiles format rules.
    ///
    /// Target columns without a plan are treated as `none`.
    pub fn new(
        schema: &TargetSchema,
        strategy: &MappingStrategy,
        source_columns: &[String],
        classifier: Arc<dyn Classifier>,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let mut tasks = Vec::with_capacity(schema.len());
        for column in schema.columns() {
            let plan = match strategy.get(&column.name) {
                Some(plan) => plan.clone(),
                None => {
                    warn!(column = %column.name, "no transformation plan, leaving column empty");
                    TransformationPlan::none("no plan")
                }
            };
            let rule = match plan.transformation_type {
                TransformationType::Format => {
                    let text = plan.transformation_rule.as_deref().ok_or_else(|| {
                        TransformationError::MissingRule {
                            column: column.name.clone(),
                        }
                    })?;
                    let rule = FormatRule::parse_for_columns(text, source_columns).map_err(
                        |source| TransformationError::Rule {
                            column: column.name.clone(),
                            source,
                        },
                    )?;
                    Some(rule)
                }
                _ => None,
            };
            tasks.push(ColumnTask {
                name: column.name.clone(),
                description: column.spec.description.clone(),
                supports_purpose_by: column.spec.supports_purpose_by.clone(),
                role: column.role,
                plan,
                rule,
            });
        }
        Ok(Self {
            purpose: schema.purpose().to_string(),
            tasks,
            source_columns: source_columns.to_vec(),
            classifier,
            policy,
        })
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Derives the Phase 1 (identity-weighted) values of `source`.
    pub fn entity_values(&self, source: &Row) -> Result<EntityValues> {
        let mut values = EntityValues::new();
        for task in self
            .tasks
            .iter()
            .filter(|task| task.role.phase() == Phase::EntityMatching)
        {
            let value = self.derive_or_degrade(task, source, None)?;
            values.insert(task.name.clone(), value);
        }
        Ok(values)
    }

    /// Produces the final target values for one incoming row.
    ///
    /// `entity_values` are the row's Phase 1 values from [`Self::entity_values`];
    /// `existing` is the matched target row, or `None` for a new entity. The
    /// returned row holds every schema column.
    pub fn apply(
        &self,
        source: &Row,
        entity_values: &EntityValues,
        existing: Option<&Row>,
    ) -> Result<Row> {
        let mut output = Row::new();
        for task in &self.tasks {
            let current = existing.map(|row| row.get(&task.name));
            if task.role.is_identifier()
                && let Some(current) = current.filter(|value| !value.is_empty())
            {
                output.set(task.name.clone(), current.clone());
                continue;
            }
            let candidate = match entity_values.get(&task.name) {
                Some(value) => value.clone(),
                None => self.derive_or_degrade(task, source, current)?,
            };
            let value = match current {
                None => candidate,
                Some(current) => self.merge(task, current, candidate)?,
            };
            trace!(
                column = %task.name,
                value = redact_value(&value.to_text()),
                "resolved column"
            );
            output.set(task.name.clone(), value);
        }
        Ok(output)
    }

    fn context<'a>(&'a self, task: &'a ColumnTask) -> ColumnContext<'a> {
        ColumnContext {
            purpose: &self.purpose,
            column: &task.name,
            description: &task.description,
            supports_purpose_by: &task.supports_purpose_by,
        }
    }

    fn derive_or_degrade(
        &self,
        task: &ColumnTask,
        source: &Row,
        current: Option<&CellValue>,
    ) -> Result<CellValue> {
        match self.derive(task, source, current) {
            Ok(value) => Ok(value),
            Err(error) => match self.policy {
                FailurePolicy::Strict => Err(error),
                FailurePolicy::Lenient => {
                    warn!(column = %task.name, error = %error, "derivation failed, treating column as none");
                    Ok(CellValue::Missing)
                }
            },
        }
    }

    fn derive(
        &self,
        task: &ColumnTask,
        source: &Row,
        current: Option<&CellValue>,
    ) -> Result<CellValue> {
        match task.plan.transformation_type {
            TransformationType::None => Ok(CellValue::Missing),
            TransformationType::Format => {
                let rule = task
                    .rule
                    .as_ref()
                    .ok_or_else(|| TransformationError::MissingRule {
                        column: task.name.clone(),
                    })?;
                Ok(CellValue::from_text(rule.evaluate(source, current)))
            }
            TransformationType::LlmFormat => {
                let sources: Vec<(String, String)> = task
                    .plan
                    .resolve_source_columns(&self.source_columns)
                    .iter()
                    .map(|column| (column.clone(), source.get(column).to_text()))
                    .collect();
                if sources.iter().all(|(_, value)| value.trim().is_empty()) {
                    return Ok(current.cloned().unwrap_or_default());
                }
                let current_text = current
                    .filter(|value| !value.is_empty())
                    .map(CellValue::to_text);

                let request = derive_request(&self.context(task), &sources, current_text.as_deref());
                let answer: ValueAnswer = classify_as(self.classifier.as_ref(), &request).map_err(
                    |source| TransformationError::Derive {
                        column: task.name.clone(),
                        source,
                    },
                )?;
                trace!(column = %task.name, reasoning = %answer.reasoning, "classifier derived value");
                Ok(coerce_scalar(&answer.value))
            }
        }
    }

    fn merge(&self, task: &ColumnTask, current: &CellValue, candidate: CellValue) -> Result<CellValue> {
        if task.role.is_identifier() {
            return Ok(if current.is_empty() {
                candidate
            } else {
                current.clone()
            });
        }

        if candidate.is_empty() {
            return Ok(current.clone());
        }
        if current.is_empty() {
            return Ok(candidate);
        }
        if normalize_identity(&current.to_text()) == normalize_identity(&candidate.to_text()) {
            return Ok(current.clone());
        }
        let already_merged = match task.plan.transformation_type {
            TransformationType::LlmFormat => true,
            TransformationType::Format => task
                .rule
                .as_ref()
                .is_some_and(FormatRule::references_current),
            TransformationType::None => false,
        };
        if already_merged {
            return Ok(candidate);
        }

        let request = merge_request(&self.context(task), &current.to_text(), &candidate.to_text());
        match classify_as::<ValueAnswer, _>(self.classifier.as_ref(), &request) {
            Ok(answer) => {
                let merged = coerce_scalar(&answer.value);
                debug!(
                    column = %task.name,
                    existing = redact_value(&current.to_text()),
                    incoming = redact_value(&candidate.to_text()),
                    merged = redact_value(&merged.to_text()),
                    "merged descriptive value"
                );
                Ok(if merged.is_empty() {
                    current.clone()
                } else {
                    merged
                })
            }
            Err(source) => match self.policy {
                FailurePolicy::Strict => Err(TransformationError::Merge {
                    column: task.name.clone(),
                    source,
                }),
                FailurePolicy::Lenient => {
                    warn!(column = %task.name, error = %source, "merge failed, keeping existing value");
                    Ok(current.clone())
                }
            },
        }
    }
}
