//! CSV reading into an in-memory [`Dataset`].

use std::path::Path;

use polars::prelude::*;
use tabfuse_model::{CellValue, Dataset};
use tracing::{debug, warn};

use crate::error::{IngestError, Result};

/// How cell types are assigned when a table is loaded.
///
/// Polars always parses every column as text; typing happens per column
/// afterwards so that values like `0151234` or `+4930...` keep their exact
/// spelling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellTyping {
    /// Columns whose values all parse as integers, floats or booleans get
    /// that type, unless any value has a leading zero or sign prefix.
    #[default]
    Infer,
    /// Every non-empty cell stays text.
    Text,
}

/// Converts a Polars `AnyValue` into a [`CellValue`], keeping integer,
/// float and boolean types.
pub fn cell_from_any_value(value: AnyValue<'_>) -> CellValue {
    match value {
        AnyValue::Null => CellValue::Missing,
        AnyValue::Boolean(b) => CellValue::Boolean(b),
        AnyValue::Int8(v) => CellValue::Integer(i64::from(v)),
        AnyValue::Int16(v) => CellValue::Integer(i64::from(v)),
        AnyValue::Int32(v) => CellValue::Integer(i64::from(v)),
        AnyValue::Int64(v) => CellValue::Integer(v),
        AnyValue::UInt8(v) => CellValue::Integer(i64::from(v)),
        AnyValue::UInt16(v) => CellValue::Integer(i64::from(v)),
        AnyValue::UInt32(v) => CellValue::Integer(i64::from(v)),
        AnyValue::UInt64(v) => {
            i64::try_from(v).map_or_else(|_| CellValue::Text(v.to_string()), CellValue::Integer)
        }
        AnyValue::Float32(v) => CellValue::Float(f64::from(v)),
        AnyValue::Float64(v) => CellValue::Float(v),
        AnyValue::String(s) => CellValue::from_text(s),
        AnyValue::StringOwned(s) => CellValue::from_text(s.as_str()),
        other => {
            // Dates and other logical types keep their display form.
            let s = other.to_string();
            let s = s
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .unwrap_or(&s);
            CellValue::from_text(s)
        }
    }
}

fn check_readable(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IngestError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IngestError::FileRead {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })
}

/// Reads a CSV file with a single header row into a [`Dataset`], inferring
/// column types with [`CellTyping::Infer`].
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    read_dataset_with(path, CellTyping::Infer)
}

/// Reads a CSV file with a single header row into a [`Dataset`].
pub fn read_dataset_with(path: &Path, typing: CellTyping) -> Result<Dataset> {
    if check_readable(path)? == 0 {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| IngestError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let dataset = dataframe_to_dataset(&df, path, typing)?;

    if dataset.columns().len() > 500 {
        warn!(
            path = %path.display(),
            columns = dataset.columns().len(),
            "Dataset has more than 500 columns - may impact performance"
        );
    }
    debug!(
        path = %path.display(),
        rows = dataset.len(),
        columns = dataset.columns().len(),
        "loaded table"
    );
    Ok(dataset)
}

/// Reads the target table at `path` when it exists and has content,
/// otherwise returns an empty dataset with `columns`.
///
/// Stored values load as text ([`CellTyping::Text`]) so identity values are
/// compared exactly as they were written.
pub fn read_dataset_or_empty(path: &Path, columns: &[String]) -> Result<Dataset> {
    let exists_with_content = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len() > 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            return Err(IngestError::FileRead {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    if exists_with_content {
        return read_dataset_with(path, CellTyping::Text);
    }
    debug!(path = %path.display(), "target table missing or empty, starting from schema columns");
    Dataset::new(columns.iter().cloned()).map_err(|source| IngestError::Structure {
        path: path.to_path_buf(),
        source,
    })
}

fn dataframe_to_dataset(df: &DataFrame, path: &Path, typing: CellTyping) -> Result<Dataset> {
    let names: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(ToString::to_string)
        .collect();

    let mut typed_columns = Vec::with_capacity(names.len());
    for column in df.get_columns() {
        let mut raw = Vec::with_capacity(df.height());
        for index in 0..df.height() {
            let cell = cell_from_any_value(column.get(index)?);
            raw.push((!cell.is_empty()).then(|| cell.to_text()));
        }
        typed_columns.push(type_column(raw, typing));
    }

    let rows = (0..df.height())
        .map(|index| {
            typed_columns
                .iter()
                .map(|cells| cells[index].clone())
                .collect()
        })
        .collect();
    Dataset::with_rows(names, rows).map_err(|source| IngestError::Structure {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
}

/// Leading zeros (`007`, `0151234`) and explicit `+` signs carry meaning in
/// identifiers, phone numbers and postal codes.
fn has_significant_prefix(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    value.starts_with('+')
        || (digits.len() > 1
            && digits.starts_with('0')
            && digits[1..].starts_with(|c: char| c.is_ascii_digit()))
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_float(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn column_type<'a>(mut values: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    if values.clone().any(has_significant_prefix) {
        return ColumnType::Text;
    }
    if values.clone().all(|v| v.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if values.clone().all(|v| parse_float(v).is_some()) {
        ColumnType::Float
    } else if values.all(|v| parse_bool(v).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

fn type_column(raw: Vec<Option<String>>, typing: CellTyping) -> Vec<CellValue> {
    let kind = match typing {
        CellTyping::Text => ColumnType::Text,
        CellTyping::Infer => {
            let present = raw.iter().flatten().map(|v| v.trim());
            if present.clone().next().is_none() {
                ColumnType::Text
            } else {
                column_type(present)
            }
        }
    };
    raw.into_iter()
        .map(|value| {
            let Some(value) = value else {
                return CellValue::Missing;
            };
            let trimmed = value.trim();
            let typed = match kind {
                ColumnType::Integer => trimmed.parse().ok().map(CellValue::Integer),
                ColumnType::Float => parse_float(trimmed).map(CellValue::Float),
                ColumnType::Boolean => parse_bool(trimmed).map(CellValue::Boolean),
                ColumnType::Text => None,
            };
            typed.unwrap_or_else(|| CellValue::from_text(value))
        })
        .collect()
}
