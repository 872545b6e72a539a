//! Row-oriented, column-addressable tabular data.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::error::{ModelError, Result};

static MISSING: CellValue = CellValue::Missing;

/// One record, addressed by column name. Absent keys read as missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub cells: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<CellValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&MISSING)
    }

    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        self.cells.insert(column.into(), value);
    }
}

/// An in-memory table: ordered, unique column names plus rows keyed by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Creates an empty dataset with the given columns.
    ///
    /// Column names are trimmed; empty or duplicate names are rejected.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let mut names = Vec::new();
        for column in columns {
            let column = column.into().trim().to_string();
            if column.is_empty() {
                return Err(ModelError::EmptyColumnName);
            }
            if !seen.insert(column.clone()) {
                return Err(ModelError::DuplicateColumn(column));
            }
            names.push(column);
        }
        Ok(Self {
            columns: names,
            rows: Vec::new(),
        })
    }

    /// Creates a dataset from positional rows aligned with `columns`.
    pub fn with_rows<S: Into<String>>(
        columns: Vec<S>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let mut dataset = Self::new(columns)?;
        let width = dataset.columns.len();
        for (index, cells) in rows.into_iter().enumerate() {
            if cells.len() != width {
                return Err(ModelError::RowWidth {
                    row: index,
                    expected: width,
                    actual: cells.len(),
                });
            }
            let row = Row {
                cells: dataset.columns.iter().cloned().zip(cells).collect(),
            };
            dataset.rows.push(row);
        }
        Ok(dataset)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut Row> {
        self.rows.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Appends `column` if it is not present yet. Returns true when it was added.
    pub fn ensure_column(&mut self, column: &str) -> Result<bool> {
        let column = column.trim();
        if column.is_empty() {
            return Err(ModelError::EmptyColumnName);
        }
        if self.has_column(column) {
            return Ok(false);
        }
        self.columns.push(column.to_string());
        Ok(true)
    }

    /// Appends a row. Cells for columns unknown to the dataset are kept on the
    /// row but are not part of the column order.
    pub fn push_row(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn get(&self, row: usize, column: &str) -> &CellValue {
        self.rows
            .get(row)
            .map_or(&MISSING, |row| row.get(column))
    }

    /// Writes one cell. Returns false when the row does not exist.
    pub fn set(&mut self, row: usize, column: impl Into<String>, value: CellValue) -> bool {
        match self.rows.get_mut(row) {
            Some(row) => {
                row.set(column, value);
                true
            }
            None => false,
        }
    }

    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a CellValue> {
        self.rows.iter().map(move |row| row.get(column))
    }
}
