//! Loading schema documents and settings from disk.

use std::fs;

use tabfuse_config::{ConfigError, SchemaDocument, load_schema_document, load_settings};
use tabfuse_model::{ColumnRole, ModelError};
use tempfile::TempDir;

const LEADS_JSON: &str = r#"{
  "purpose": "Track sales leads",
  "target_file_path": "out/leads.csv",
  "sample_rows": 3,
  "enrichment_columns": {
    "email": {
      "description": "Work email",
      "is_entity_identifier": true,
      "identity_indication": 0.7
    },
    "company": {
      "description": "Employer",
      "is_entity_identifier": true
    },
    "notes": { "description": "Sales notes" }
  }
}"#;

#[test]
fn loads_json_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leads.json");
    fs::write(&path, LEADS_JSON).unwrap();

    let document = load_schema_document(&path).unwrap();
    assert_eq!(document.sample_rows, 3);
    assert_eq!(
        document.target_file_path,
        Some(dir.path().join("out/leads.csv"))
    );

    let schema = document.into_schema().unwrap();
    assert_eq!(schema.column_names(), vec!["email", "company", "notes"]);
    assert_eq!(schema.role("email"), Some(ColumnRole::IdentityWeighted(0.7)));
    assert_eq!(schema.role("company"), Some(ColumnRole::IdentityUnweighted));
    assert_eq!(schema.role("notes"), Some(ColumnRole::Descriptive));
}

#[test]
fn toml_and_json_agree() {
    let dir = TempDir::new().unwrap();
    let json_path = dir.path().join("leads.json");
    fs::write(&json_path, LEADS_JSON).unwrap();
    let from_json = load_schema_document(&json_path).unwrap();

    let toml_path = dir.path().join("leads.toml");
    let mut relative = from_json.clone();
    relative.target_file_path = Some("out/leads.csv".into());
    fs::write(&toml_path, relative.to_toml_string().unwrap()).unwrap();
    let from_toml = load_schema_document(&toml_path).unwrap();

    assert_eq!(from_toml, from_json);
}

#[test]
fn weight_without_identifier_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(
        &path,
        r#"
purpose = "p"

[enrichment_columns.email]
description = "Work email"
identity_indication = 0.5
"#,
    )
    .unwrap();

    let error = load_schema_document(&path).unwrap_err();
    assert!(matches!(
        error,
        ConfigError::Schema {
            source: ModelError::WeightWithoutIdentifier { .. },
            ..
        }
    ));
}

#[test]
fn weight_above_one_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        r#"{"purpose": "p", "enrichment_columns": {"id": {"description": "d", "is_entity_identifier": true, "identity_indication": 1.5}}}"#,
    )
    .unwrap();
    assert!(matches!(
        load_schema_document(&path),
        Err(ConfigError::Schema {
            source: ModelError::IdentityWeightOutOfRange { .. },
            ..
        })
    ));
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schema.yaml");
    fs::write(&path, "purpose: p").unwrap();
    assert!(matches!(
        load_schema_document(&path),
        Err(ConfigError::UnsupportedFormat { .. })
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_schema_document(&dir.path().join("none.toml")),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn starter_document_quotes_column_names() {
    let columns = vec!["Email".to_string(), "Full Name".to_string()];
    let document = SchemaDocument::from_table_columns("Track sales leads", &columns);
    let text = document.to_toml_string().unwrap();
    assert!(text.starts_with("purpose = \"Track sales leads\""));
    assert!(text.contains("[enrichment_columns.\"Full Name\"]"));
    assert!(!text.contains("target_file_path"));

    let reparsed: SchemaDocument = toml::from_str(&text).unwrap();
    assert_eq!(reparsed, document);
}

#[test]
fn settings_file_is_validated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(&path, "[classifier]\ntemperature = 5.0\n").unwrap();
    assert!(matches!(
        load_settings(Some(&path)),
        Err(ConfigError::InvalidSetting {
            field: "classifier.temperature",
            ..
        })
    ));

    fs::write(&path, "[executor]\nmax_retries = 0\n").unwrap();
    let settings = load_settings(Some(&path)).unwrap();
    assert_eq!(settings.executor_options().max_retries, 0);
}
