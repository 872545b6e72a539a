//! Target schema definitions and column roles.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Declared semantics of one target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// What the column holds.
    pub description: String,
    /// How the column serves the dataset purpose.
    #[serde(default)]
    pub supports_purpose_by: String,
    /// Whether the column carries entity identity.
    #[serde(default)]
    pub is_entity_identifier: bool,
    /// Weight of this column as match evidence (0.0 to 1.0).
    #[serde(default)]
    pub identity_indication: f64,
}

impl ColumnSpec {
    /// A descriptive column with the given description.
    pub fn descriptive(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            supports_purpose_by: String::new(),
            is_entity_identifier: false,
            identity_indication: 0.0,
        }
    }

    /// An identifier column carrying `weight` match evidence.
    pub fn identifier(description: impl Into<String>, weight: f64) -> Self {
        Self {
            description: description.into(),
            supports_purpose_by: String::new(),
            is_entity_identifier: true,
            identity_indication: weight,
        }
    }

    pub fn with_purpose(mut self, supports_purpose_by: impl Into<String>) -> Self {
        self.supports_purpose_by = supports_purpose_by.into();
        self
    }

    /// Derives the column's role. Assumes the spec has been validated.
    pub fn role(&self) -> ColumnRole {
        if !self.is_entity_identifier {
            ColumnRole::Descriptive
        } else if self.identity_indication > 0.0 {
            ColumnRole::IdentityWeighted(self.identity_indication)
        } else {
            ColumnRole::IdentityUnweighted
        }
    }

    fn validate(&self, column: &str) -> Result<()> {
        let weight = self.identity_indication;
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(ModelError::IdentityWeightOutOfRange {
                column: column.to_string(),
                value: weight,
            });
        }
        if weight > 0.0 && !self.is_entity_identifier {
            return Err(ModelError::WeightWithoutIdentifier {
                column: column.to_string(),
                value: weight,
            });
        }
        Ok(())
    }
}

/// How a target column takes part in entity matching and merging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "weight", rename_all = "snake_case")]
pub enum ColumnRole {
    /// Identifier contributing the given weight to the match score.
    IdentityWeighted(f64),
    /// Identifier that is kept stable on merge but carries no match weight.
    IdentityUnweighted,
    /// Free content merged through the classifier.
    Descriptive,
}

impl ColumnRole {
    pub fn weight(self) -> f64 {
        match self {
            Self::IdentityWeighted(weight) => weight,
            _ => 0.0,
        }
    }

    pub fn is_identifier(self) -> bool {
        !matches!(self, Self::Descriptive)
    }

    /// Identity-weighted columns resolve first so matching never depends on other columns.
    pub fn phase(self) -> Phase {
        match self {
            Self::IdentityWeighted(_) => Phase::EntityMatching,
            _ => Phase::Remaining,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::IdentityWeighted(_) => "identity (weighted)",
            Self::IdentityUnweighted => "identity (unweighted)",
            Self::Descriptive => "descriptive",
        }
    }
}

/// Resolution order of target columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase 1: identity-weighted columns.
    EntityMatching,
    /// Phase 2: every other column.
    Remaining,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntityMatching => f.write_str("phase 1 (entity matching)"),
            Self::Remaining => f.write_str("phase 2 (remaining columns)"),
        }
    }
}

/// A named target column with its spec and derived role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetColumn {
    pub name: String,
    pub spec: ColumnSpec,
    pub role: ColumnRole,
}

/// Declared target structure: a purpose statement and ordered, unique columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSchema {
    purpose: String,
    columns: Vec<TargetColumn>,
}

impl TargetSchema {
    /// Validates the column specs and computes each column's role once.
    pub fn new(purpose: impl Into<String>, columns: Vec<(String, ColumnSpec)>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ModelError::NoColumns);
        }
        let mut seen = BTreeSet::new();
        let mut target_columns = Vec::with_capacity(columns.len());
        for (name, spec) in columns {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ModelError::EmptyColumnName);
            }
            if !seen.insert(name.clone()) {
                return Err(ModelError::DuplicateColumn(name));
            }
            spec.validate(&name)?;
            let role = spec.role();
            target_columns.push(TargetColumn { name, spec, role });
        }
        Ok(Self {
            purpose: purpose.into(),
            columns: target_columns,
        })
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn columns(&self) -> &[TargetColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TargetColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn role(&self, name: &str) -> Option<ColumnRole> {
        self.column(name).map(|column| column.role)
    }

    /// Every column's role, in schema order.
    pub fn roles(&self) -> Vec<(&str, ColumnRole)> {
        self.columns
            .iter()
            .map(|column| (column.name.as_str(), column.role))
            .collect()
    }

    /// Columns resolved in the given phase, in schema order.
    pub fn columns_in_phase(&self, phase: Phase) -> impl Iterator<Item = &TargetColumn> {
        self.columns
            .iter()
            .filter(move |column| column.role.phase() == phase)
    }

    /// Phase 1 columns: identifiers with positive weight.
    pub fn entity_columns(&self) -> impl Iterator<Item = &TargetColumn> {
        self.columns_in_phase(Phase::EntityMatching)
    }

    /// Phase 2 columns: everything else.
    pub fn remaining_columns(&self) -> impl Iterator<Item = &TargetColumn> {
        self.columns_in_phase(Phase::Remaining)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
