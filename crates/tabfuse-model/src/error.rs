//! Error types for model construction and validation.

use thiserror::Error;

/// Errors raised while building model values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A column name was empty or whitespace only.
    #[error("column name must not be empty")]
    EmptyColumnName,

    /// The same column name appeared twice.
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A schema declared no columns at all.
    #[error("target schema declares no columns")]
    NoColumns,

    /// Identity weight outside of [0, 1] or not a finite number.
    #[error("identity_indication for column '{column}' must be within [0, 1], got {value}")]
    IdentityWeightOutOfRange { column: String, value: f64 },

    /// A column carries identity weight without being flagged as an identifier.
    #[error(
        "column '{column}' has identity_indication {value} but is_entity_identifier is false"
    )]
    WeightWithoutIdentifier { column: String, value: f64 },

    /// A row had a different number of cells than the dataset has columns.
    #[error("row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
