//! Error types for transformation and merging.

use tabfuse_classify::ClassifyError;
use thiserror::Error;

use crate::rule::RuleError;

/// A single column's derivation or merge failed.
#[derive(Debug, Error)]
pub enum TransformationError {
    /// A `format` plan carries no rule.
    #[error("column '{column}': format plan has no transformation_rule")]
    MissingRule { column: String },

    /// A `format` plan's rule does not parse.
    #[error("column '{column}': invalid format rule: {source}")]
    Rule {
        column: String,
        #[source]
        source: RuleError,
    },

    /// The classifier failed to derive a value.
    #[error("column '{column}': value derivation failed: {source}")]
    Derive {
        column: String,
        #[source]
        source: ClassifyError,
    },

    /// The classifier failed to merge the existing and incoming values.
    #[error("column '{column}': merge failed: {source}")]
    Merge {
        column: String,
        #[source]
        source: ClassifyError,
    },
}

impl TransformationError {
    pub fn column(&self) -> &str {
        match self {
            Self::MissingRule { column }
            | Self::Rule { column, .. }
            | Self::Derive { column, .. }
            | Self::Merge { column, .. } => column,
        }
    }
}

/// Result type for transformation operations.
pub type Result<T> = std::result::Result<T, TransformationError>;
