//! Entity matching and the end-to-end ingestion pipeline.

pub mod matcher;
pub mod pipeline;

// === Matching ===
pub use matcher::{EntityMatcher, MATCH_THRESHOLD, MatchingError, SCORE_TOLERANCE, is_match};

// === Pipeline ===
pub use pipeline::{
    IngestionOutcome, IngestionReport, Ingestor, PipelineError, Result, RowAction, RowDecision,
};
