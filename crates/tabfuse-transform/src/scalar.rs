//! Scalar coercion of classifier answers.

use serde_json::Value;
use tabfuse_model::CellValue;

/// Coerces a JSON answer into a single scalar cell.
///
/// One-element arrays unwrap to their element, so `[50000]` becomes the
/// integer `50000` (rendered `"50000"`), never a collection rendering.
/// Longer arrays join their non-empty elements with `", "`; objects yield
/// their `value` field when present.
pub fn coerce_scalar(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Missing,
        Value::Bool(b) => CellValue::Boolean(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => CellValue::Integer(i),
            (None, Some(f)) => CellValue::Float(f),
            (None, None) => CellValue::from_text(n.to_string()),
        },
        Value::String(s) => CellValue::from_text(s.as_str()),
        Value::Array(items) if items.len() == 1 => coerce_scalar(&items[0]),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| coerce_scalar(item).to_text())
                .filter(|text| !text.trim().is_empty())
                .collect();
            CellValue::from_text(parts.join(", "))
        }
        Value::Object(map) => match map.get("value") {
            Some(inner) => coerce_scalar(inner),
            None => CellValue::from_text(value.to_string()),
        },
    }
}
