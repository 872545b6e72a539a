//! Classifier requests issued while profiling and planning.

use serde::Deserialize;
use serde_json::{Value, json};
use tabfuse_classify::{ChatMessage, ClassifierRequest};
use tabfuse_model::{ColumnKind, ColumnStats, DatasetProfile, TargetColumn};
use tabfuse_transform::rule_syntax;

pub(crate) const PROFILE_REQUEST: &str = "column_profile";
pub(crate) const PLAN_REQUEST: &str = "column_plan";
pub(crate) const TABLE_REQUEST: &str = "table_profile";

const PROFILE_SYSTEM: &str = "You profile columns of tabular data. Answer with JSON only.";

const PLAN_SYSTEM: &str = "You plan how each column of a target table is derived \
from the columns of an incoming table. Answer with JSON only.";

/// Classifier view of one source column.
#[derive(Debug, Deserialize)]
pub(crate) struct ProfileAnswer {
    pub kind: ColumnKind,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

pub(crate) fn profile_request(
    dataset_purpose: &str,
    column: &str,
    stats: &ColumnStats,
    samples: &[String],
    hint: ColumnKind,
) -> ClassifierRequest {
    let prompt = format!(
        "Dataset purpose: {dataset_purpose}\n\
         Column: {column}\n\
         Rows: {total}, non-empty: {non_null}, distinct: {unique}, completeness: {completeness:.2}\n\
         Sample values: {samples}\n\
         Heuristic guess: {hint}\n\n\
         Classify the column as `identifier` (structured, low-entropy tokens such as \
         emails, codes or ids) or `text` (free-form content), describe its purpose in \
         one sentence, and rate your confidence between 0 and 1.",
        total = stats.total_count,
        non_null = stats.non_null_count,
        unique = stats.unique_count,
        completeness = stats.completeness,
        samples = json!(samples),
    );
    ClassifierRequest::new(
        PROFILE_REQUEST,
        vec![ChatMessage::system(PROFILE_SYSTEM), ChatMessage::user(prompt)],
        json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "enum": ["identifier", "text"] },
                "purpose": { "type": "string" },
                "reasoning": { "type": "string" },
                "confidence": { "type": "number" }
            },
            "required": ["kind", "purpose", "reasoning", "confidence"],
            "additionalProperties": false
        }),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct QualityAnswer {
    pub completeness: String,
    pub consistency: String,
    pub potential_duplicates: String,
}

/// Classifier view of the whole source table.
#[derive(Debug, Deserialize)]
pub(crate) struct TableAnswer {
    pub table_purpose: String,
    pub data_source: String,
    pub primary_entity: String,
    #[serde(default)]
    pub identifier_candidates: Vec<String>,
    pub quality_assessment: QualityAnswer,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Asks for the table's overall purpose once the columns are profiled.
pub(crate) fn table_request(dataset_purpose: &str, profile: &DatasetProfile) -> ClassifierRequest {
    let prompt = format!(
        "Dataset purpose: {dataset_purpose}\n\
         Rows: {rows}, columns: {columns}\n\n\
         Column profiles:\n{described}\n\
         Looking at the columns together, describe the table's overall business purpose, \
         where the data most likely came from, and the kind of entity one row describes. \
         List the column names that could identify that entity, assess the data quality, \
         and rate your confidence between 0 and 1.",
        rows = profile.row_count,
        columns = profile.columns.len(),
        described = describe_columns(profile),
    );
    ClassifierRequest::new(
        TABLE_REQUEST,
        vec![ChatMessage::system(PROFILE_SYSTEM), ChatMessage::user(prompt)],
        json!({
            "type": "object",
            "properties": {
                "table_purpose": { "type": "string" },
                "data_source": { "type": "string" },
                "primary_entity": { "type": "string" },
                "identifier_candidates": { "type": "array", "items": { "type": "string" } },
                "quality_assessment": {
                    "type": "object",
                    "properties": {
                        "completeness": { "type": "string" },
                        "consistency": { "type": "string" },
                        "potential_duplicates": { "type": "string" }
                    },
                    "required": ["completeness", "consistency", "potential_duplicates"],
                    "additionalProperties": false
                },
                "reasoning": { "type": "string" },
                "confidence": { "type": "number" }
            },
            "required": [
                "table_purpose",
                "data_source",
                "primary_entity",
                "identifier_candidates",
                "quality_assessment",
                "reasoning",
                "confidence"
            ],
            "additionalProperties": false
        }),
    )
}

/// Renders the source profile once per strategy run.
pub(crate) fn describe_sources(profile: &DatasetProfile) -> String {
    let table = &profile.table;
    if table.is_fallback() {
        return describe_columns(profile);
    }
    let mut text = format!(
        "Source table: {purpose} (from {source}, one row per {entity})\n",
        purpose = table.purpose,
        source = table.data_source,
        entity = table.primary_entity,
    );
    text.push_str(&describe_columns(profile));
    text
}

fn describe_columns(profile: &DatasetProfile) -> String {
    let mut text = String::new();
    for entry in &profile.columns {
        let column = &entry.profile;
        text.push_str(&format!(
            "- {name}: {kind}, completeness {completeness:.2}, distinct {unique}",
            name = entry.name,
            kind = column.kind,
            completeness = column.stats.completeness,
            unique = column.stats.unique_count,
        ));
        if !column.purpose.is_empty() {
            text.push_str(&format!(", purpose: {}", column.purpose));
        }
        if !column.sample_values.is_empty() {
            text.push_str(&format!(", samples: {}", json!(column.sample_values)));
        }
        text.push('\n');
    }
    text
}

pub(crate) fn plan_request(purpose: &str, sources: &str, target: &TargetColumn) -> ClassifierRequest {
    let role_note = if target.role.weight() > 0.0 {
        "This column decides whether an incoming row describes an entity already in the \
         target table. Normalise it so different spellings of the same entity compare equal."
    } else if target.role.is_identifier() {
        "This column identifies the entity but is not used for matching. Keep values stable."
    } else {
        "This column holds descriptive content."
    };
    let mut prompt = format!(
        "Target table purpose: {purpose}\n\
         Target column: {name} ({role})\n\
         Description: {description}\n",
        name = target.name,
        role = target.role.label(),
        description = target.spec.description,
    );
    if !target.spec.supports_purpose_by.is_empty() {
        prompt.push_str(&format!(
            "Supports the purpose by: {}\n",
            target.spec.supports_purpose_by
        ));
    }
    prompt.push_str(&format!(
        "{role_note}\n\nSource columns:\n{sources}\n\
         Choose a transformation_type:\n\
         - `none` when no source column supplies this field;\n\
         - `format` for a deterministic derivation, with `transformation_rule` set;\n\
         - `llm_format` when the value needs interpretation, with `llm_source_columns` \
         listing the source columns to read.\n\n{}",
        rule_syntax()
    ));
    ClassifierRequest::new(
        PLAN_REQUEST,
        vec![ChatMessage::system(PLAN_SYSTEM), ChatMessage::user(prompt)],
        plan_schema(),
    )
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reasoning": { "type": "string" },
            "transformation_type": { "type": "string", "enum": ["none", "format", "llm_format"] },
            "transformation_rule": { "type": ["string", "null"] },
            "llm_source_columns": {
                "type": ["array", "null"],
                "items": { "type": "string" }
            }
        },
        "required": ["reasoning", "transformation_type", "transformation_rule", "llm_source_columns"],
        "additionalProperties": false
    })
}
