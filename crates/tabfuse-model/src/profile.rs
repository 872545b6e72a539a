//! Source column profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inferred structural kind of a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Structured, low-entropy tokens such as emails, codes or ids.
    Identifier,
    /// Free-form content.
    Text,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier => f.write_str("identifier"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Summary statistics of one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub total_count: usize,
    pub non_null_count: usize,
    pub unique_count: usize,
    /// `non_null_count / total_count`, 0.0 for an empty column.
    pub completeness: f64,
}

impl ColumnStats {
    /// Share of distinct values among the non-null ones.
    pub fn unique_ratio(&self) -> f64 {
        if self.non_null_count == 0 {
            0.0
        } else {
            self.unique_count as f64 / self.non_null_count as f64
        }
    }
}

/// Profile of one source column, produced once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub kind: ColumnKind,
    /// Short description of what the column is for.
    pub purpose: String,
    /// Classifier rationale, kept for observability.
    pub reasoning: String,
    /// 0.0 marks a fallback profile.
    pub confidence: f32,
    pub stats: ColumnStats,
    #[serde(default)]
    pub sample_values: Vec<String>,
}

impl ColumnProfile {
    /// Lowest-confidence profile used when classification fails.
    pub fn fallback(stats: ColumnStats, sample_values: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: ColumnKind::Text,
            purpose: String::new(),
            reasoning: reason.into(),
            confidence: 0.0,
            stats,
            sample_values,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.confidence <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfiledColumn {
    pub name: String,
    pub profile: ColumnProfile,
}

/// Free-text quality notes about a whole table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub completeness: String,
    pub consistency: String,
    pub potential_duplicates: String,
}

/// Table-level reading of a source dataset, built on top of the column profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    /// What the table as a whole is for.
    pub purpose: String,
    /// Where the data most likely came from.
    pub data_source: String,
    /// The kind of entity one row describes.
    pub primary_entity: String,
    /// Source columns that look like they identify the entity.
    #[serde(default)]
    pub identifier_candidates: Vec<String>,
    #[serde(default)]
    pub quality: QualityAssessment,
    #[serde(default)]
    pub reasoning: String,
    /// 0.0 marks a fallback summary.
    pub confidence: f32,
}

impl TableSummary {
    /// Empty summary used when the table-level classification fails.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            reasoning: reason.into(),
            ..Self::default()
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.confidence <= 0.0
    }
}

/// Profiles of every column of a source dataset, in source column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub columns: Vec<ProfiledColumn>,
    #[serde(default)]
    pub table: TableSummary,
}

impl DatasetProfile {
    pub fn get(&self, column: &str) -> Option<&ColumnProfile> {
        self.columns
            .iter()
            .find(|entry| entry.name == column)
            .map(|entry| &entry.profile)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_ratio_ignores_nulls() {
        let stats = ColumnStats {
            total_count: 10,
            non_null_count: 4,
            unique_count: 2,
            completeness: 0.4,
        };
        assert!((stats.unique_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(ColumnStats::default().unique_ratio(), 0.0);
    }

    #[test]
    fn missing_table_summary_deserializes_as_fallback() {
        let profile: DatasetProfile =
            serde_json::from_str(r#"{"row_count": 2, "columns": []}"#).unwrap();
        assert!(profile.table.is_fallback());
        assert!(TableSummary::fallback("timeout").is_fallback());
    }

    #[test]
    fn fallback_is_low_confidence_text() {
        let profile = ColumnProfile::fallback(ColumnStats::default(), Vec::new(), "timeout");
        assert_eq!(profile.kind, ColumnKind::Text);
        assert!(profile.is_fallback());
    }
}
