//! Per-target-column transformation plans.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Phase;

/// How a target column value is derived from source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    /// No source column supplies this field.
    #[default]
    None,
    /// Deterministic rule-based derivation.
    Format,
    /// Classifier-assisted derivation.
    LlmFormat,
}

impl TransformationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Format => "format",
            Self::LlmFormat => "llm_format",
        }
    }
}

impl fmt::Display for TransformationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decided derivation for one target column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformationPlan {
    pub transformation_type: TransformationType,
    /// Rule text for `format` plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation_rule: Option<String>,
    /// Source columns read by the plan. `None` means every source column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_source_columns: Option<Vec<String>>,
    #[serde(default)]
    pub reasoning: String,
}

impl TransformationPlan {
    pub fn none(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            ..Self::default()
        }
    }

    pub fn format(rule: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            transformation_type: TransformationType::Format,
            transformation_rule: Some(rule.into()),
            llm_source_columns: None,
            reasoning: reasoning.into(),
        }
    }

    pub fn llm_format(source_columns: Option<Vec<String>>, reasoning: impl Into<String>) -> Self {
        Self {
            transformation_type: TransformationType::LlmFormat,
            transformation_rule: None,
            llm_source_columns: source_columns,
            reasoning: reasoning.into(),
        }
    }

    /// Source columns the plan reads, falling back to all of `available`.
    pub fn resolve_source_columns<'a>(&'a self, available: &'a [String]) -> &'a [String] {
        match &self.llm_source_columns {
            Some(columns) if !columns.is_empty() => columns,
            _ => available,
        }
    }
}

/// A plan bound to its target column and resolution phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPlan {
    pub column: String,
    pub phase: Phase,
    pub plan: TransformationPlan,
}

/// One plan per target column, in target schema order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingStrategy {
    pub plans: Vec<ColumnPlan>,
}

impl MappingStrategy {
    pub fn get(&self, column: &str) -> Option<&TransformationPlan> {
        self.plans
            .iter()
            .find(|entry| entry.column == column)
            .map(|entry| &entry.plan)
    }

    pub fn plans_in_phase(&self, phase: Phase) -> impl Iterator<Item = &ColumnPlan> {
        self.plans.iter().filter(move |entry| entry.phase == phase)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
