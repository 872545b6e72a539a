//! Column statistics and the structural kind heuristic.

use std::collections::{BTreeSet, HashMap};

use tabfuse_common::normalize_text;
use tabfuse_model::{ColumnKind, ColumnStats, Dataset};

/// Share of values that must be single whitespace-free tokens.
const TOKEN_SHARE: f64 = 0.9;
/// Minimum distinct/non-null ratio for an identifier.
const MIN_UNIQUE_RATIO: f64 = 0.8;
/// Share of values that must share the dominant character-class shape.
const SHAPE_SHARE: f64 = 0.8;
/// Identifiers are short; longer values are content.
const MAX_MEAN_LENGTH: f64 = 64.0;

/// Counts values, non-empty values and distinct non-empty values of `column`.
///
/// Distinctness compares whitespace-collapsed text, so `"a  b"` and `"a b"`
/// count once. A column absent from the dataset yields all-zero stats.
pub fn compute_stats(dataset: &Dataset, column: &str) -> ColumnStats {
    if !dataset.has_column(column) {
        return ColumnStats::default();
    }
    let total_count = dataset.len();
    let mut non_null_count = 0;
    let mut distinct = BTreeSet::new();
    for value in dataset.column_values(column) {
        if value.is_empty() {
            continue;
        }
        non_null_count += 1;
        distinct.insert(normalize_text(&value.to_text()));
    }
    let completeness = if total_count == 0 {
        0.0
    } else {
        non_null_count as f64 / total_count as f64
    };
    ColumnStats {
        total_count,
        non_null_count,
        unique_count: distinct.len(),
        completeness,
    }
}

/// Up to `limit` distinct non-empty values of `column`, in row order.
pub fn sample_values(dataset: &Dataset, column: &str, limit: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut samples = Vec::new();
    for value in dataset.column_values(column) {
        if samples.len() >= limit {
            break;
        }
        if value.is_empty() {
            continue;
        }
        let text = value.to_text();
        if seen.insert(text.clone()) {
            samples.push(text);
        }
    }
    samples
}

/// Local guess at a column's kind.
///
/// Identifier columns hold short, whitespace-free tokens with high uniqueness
/// and a consistent character-class shape (emails, codes, ids). Everything
/// else, including empty columns, is text.
pub fn heuristic_kind(dataset: &Dataset, column: &str, stats: &ColumnStats) -> ColumnKind {
    if stats.non_null_count == 0 || stats.unique_ratio() < MIN_UNIQUE_RATIO {
        return ColumnKind::Text;
    }

    let texts: Vec<String> = dataset
        .column_values(column)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_text().trim().to_string())
        .collect();
    let count = texts.len() as f64;

    let tokens = texts
        .iter()
        .filter(|text| !text.chars().any(char::is_whitespace))
        .count();
    let mean_length = texts.iter().map(|text| text.chars().count()).sum::<usize>() as f64 / count;

    let mut shapes: HashMap<u8, usize> = HashMap::new();
    for text in &texts {
        *shapes.entry(shape(text)).or_default() += 1;
    }
    let dominant = shapes.values().copied().max().unwrap_or(0);

    if tokens as f64 / count >= TOKEN_SHARE
        && dominant as f64 / count >= SHAPE_SHARE
        && mean_length <= MAX_MEAN_LENGTH
    {
        ColumnKind::Identifier
    } else {
        ColumnKind::Text
    }
}

/// Bit set of the character classes present in `text`.
fn shape(text: &str) -> u8 {
    text.chars().fold(0, |bits, c| {
        bits | if c.is_alphabetic() {
            0b001
        } else if c.is_numeric() {
            0b010
        } else {
            0b100
        }
    })
}
