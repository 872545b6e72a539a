//! Entity match decisions.

use serde::{Deserialize, Serialize};

/// Outcome of matching one incoming row against the target dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityMatchResult {
    /// Matched target row index, `None` for a new entity.
    pub target_row: Option<usize>,
    /// Score that produced the decision: the matched row's score, or the best
    /// score seen when no row reached the threshold.
    pub score: f64,
}

impl EntityMatchResult {
    pub fn matched(target_row: usize, score: f64) -> Self {
        Self {
            target_row: Some(target_row),
            score,
        }
    }

    pub fn new_entity(best_score: f64) -> Self {
        Self {
            target_row: None,
            score: best_score,
        }
    }

    pub fn is_match(&self) -> bool {
        self.target_row.is_some()
    }
}
