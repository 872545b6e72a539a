//! Data model for schema-driven table ingestion.
//!
//! Holds the values every other tabfuse crate passes around: cells and
//! datasets, the target schema with its column roles, source column profiles,
//! transformation plans and entity match results. Nothing here performs I/O.

pub mod cell;
pub mod dataset;
pub mod error;
pub mod matching;
pub mod plan;
pub mod profile;
pub mod schema;

// === Values ===
pub use cell::{CellValue, format_float};
pub use dataset::{Dataset, Row};

// === Errors ===
pub use error::{ModelError, Result};

// === Schema ===
pub use schema::{ColumnRole, ColumnSpec, Phase, TargetColumn, TargetSchema};

// === Profiles ===
pub use profile::{
    ColumnKind, ColumnProfile, ColumnStats, DatasetProfile, ProfiledColumn, QualityAssessment,
    TableSummary,
};

// === Plans ===
pub use plan::{ColumnPlan, MappingStrategy, TransformationPlan, TransformationType};

// === Matching ===
pub use matching::EntityMatchResult;
