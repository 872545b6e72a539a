//! Schema configuration documents.
//!
//! A document names the target table's purpose and its columns, in order:
//!
//! ```toml
//! purpose = "Track sales leads"
//! target_file_path = "leads.csv"
//!
//! [enrichment_columns.email]
//! description = "Work email"
//! is_entity_identifier = true
//! identity_indication = 1.0
//!
//! [enrichment_columns.notes]
//! description = "Sales notes"
//! ```
//!
//! TOML and JSON are accepted, chosen by file extension.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tabfuse_model::{ColumnSpec, ModelError, TargetSchema};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Default number of sample values per source column shown to the classifier.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

fn default_sample_rows() -> usize {
    DEFAULT_SAMPLE_ROWS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub purpose: String,
    /// Default target table location. Relative paths resolve against the
    /// document's directory when loaded from a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_file_path: Option<PathBuf>,
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    #[serde(with = "ordered_columns")]
    pub enrichment_columns: Vec<(String, ColumnSpec)>,
}

impl SchemaDocument {
    /// Validates the document and builds the target schema.
    pub fn into_schema(self) -> std::result::Result<TargetSchema, ModelError> {
        TargetSchema::new(self.purpose, self.enrichment_columns)
    }

    /// Starter document with one descriptive column per table column.
    ///
    /// Descriptions are left empty for the user to fill in.
    pub fn from_table_columns(purpose: impl Into<String>, columns: &[String]) -> Self {
        Self {
            purpose: purpose.into(),
            target_file_path: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            enrichment_columns: columns
                .iter()
                .map(|name| (name.clone(), ColumnSpec::descriptive("")))
                .collect(),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(target) = &self.target_file_path
            && target.is_relative()
        {
            self.target_file_path = Some(base.join(target));
        }
    }
}

/// Loads and validates a schema document.
pub fn load_schema_document(path: &Path) -> Result<SchemaDocument> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let mut document: SchemaDocument = match extension.as_deref() {
        Some("toml") => toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?,
        Some("json") => serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }
    };

    document
        .clone()
        .into_schema()
        .map_err(|source| ConfigError::Schema {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(base) = path.parent() {
        document.resolve_paths(base);
    }
    debug!(
        path = %path.display(),
        columns = document.enrichment_columns.len(),
        "loaded schema document"
    );
    Ok(document)
}

/// (De)serializes the column list as a map, keeping document order.
mod ordered_columns {
    use super::{ColumnSpec, Deserializer, MapAccess, SerializeMap, Serializer, Visitor, fmt};

    pub fn serialize<S: Serializer>(
        columns: &[(String, ColumnSpec)],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(columns.len()))?;
        for (name, spec) in columns {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<(String, ColumnSpec)>, D::Error> {
        deserializer.deserialize_map(ColumnsVisitor)
    }

    struct ColumnsVisitor;

    impl<'de> Visitor<'de> for ColumnsVisitor {
        type Value = Vec<(String, ColumnSpec)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of column name to column definition")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
            let mut columns = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, spec)) = access.next_entry::<String, ColumnSpec>()? {
                columns.push((name, spec));
            }
            Ok(columns)
        }
    }
}
