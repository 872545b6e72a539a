//! Entity matcher.
//!
//! Scores an incoming row's Phase 1 values against existing target rows. The
//! score is the sum of `identity_indication` over identity-weighted columns
//! whose normalised values are equal and non-empty; a row scoring at least
//! [`MATCH_THRESHOLD`] is the same entity.

use tabfuse_common::normalize_identity;
use tabfuse_model::{EntityMatchResult, Row, TargetSchema};
use tabfuse_transform::EntityValues;
use thiserror::Error;

/// Score at which an existing row is the same entity.
pub const MATCH_THRESHOLD: f64 = 1.0;

/// Absorbs float error in sums such as `0.7 + 0.2 + 0.1`.
pub const SCORE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("no value was derived for identity column '{column}'")]
    MissingIdentityValue { column: String },

    #[error("identity weight of column '{column}' is not a finite number: {weight}")]
    InvalidWeight { column: String, weight: f64 },
}

#[derive(Debug, Clone)]
pub struct EntityMatcher {
    weights: Vec<(String, f64)>,
}

impl EntityMatcher {
    pub fn new(schema: &TargetSchema) -> Result<Self, MatchingError> {
        let mut weights = Vec::new();
        for column in schema.entity_columns() {
            let weight = column.role.weight();
            if !weight.is_finite() {
                return Err(MatchingError::InvalidWeight {
                    column: column.name.clone(),
                    weight,
                });
            }
            weights.push((column.name.clone(), weight));
        }
        Ok(Self { weights })
    }

    /// Identity-weighted columns and their weights, in schema order.
    pub fn weights(&self) -> &[(String, f64)] {
        &self.weights
    }

    /// Weighted evidence that `values` and `row` describe the same entity.
    pub fn score(&self, values: &EntityValues, row: &Row) -> Result<f64, MatchingError> {
        let mut score = 0.0;
        for (column, weight) in &self.weights {
            let incoming = values
                .get(column)
                .ok_or_else(|| MatchingError::MissingIdentityValue {
                    column: column.clone(),
                })?;
            let existing = row.get(column);
            if incoming.is_empty() || existing.is_empty() {
                continue;
            }
            if normalize_identity(&incoming.to_text()) == normalize_identity(&existing.to_text()) {
                score += weight;
            }
        }
        Ok(score)
    }

    /// Finds the earliest of `rows` that reaches the threshold.
    ///
    /// Without a match, the result carries the best score seen.
    pub fn match_row(
        &self,
        values: &EntityValues,
        rows: &[Row],
    ) -> Result<EntityMatchResult, MatchingError> {
        let mut best = 0.0_f64;
        for (index, row) in rows.iter().enumerate() {
            let score = self.score(values, row)?;
            if is_match(score) {
                return Ok(EntityMatchResult::matched(index, score));
            }
            best = best.max(score);
        }
        Ok(EntityMatchResult::new_entity(best))
    }
}

pub fn is_match(score: f64) -> bool {
    score >= MATCH_THRESHOLD - SCORE_TOLERANCE
}
