//! Scalar cell values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar value in a dataset.
///
/// Values keep the type inferred on load so that numbers survive until they are
/// rendered; every consumer that needs text goes through [`CellValue::to_text`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl CellValue {
    /// Builds a text cell, mapping blank input to [`CellValue::Missing`].
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.trim().is_empty() {
            Self::Missing
        } else {
            Self::Text(raw)
        }
    }

    /// True for missing values and blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the value as plain scalar text.
    ///
    /// Integers render without a decimal point, floats without trailing zeros,
    /// booleans as `true`/`false`, missing values as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => format_float(*value),
            Self::Boolean(value) => value.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::from_text(value)
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::from_text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Formats a float without trailing zeros; integral values print without a decimal point.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
