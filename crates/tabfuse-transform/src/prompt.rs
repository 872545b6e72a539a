//! Classifier requests issued by the processor.

use serde::Deserialize;
use serde_json::{Map, Value, json};
use tabfuse_classify::{ChatMessage, ClassifierRequest};

pub(crate) const DERIVE_REQUEST: &str = "derive_value";
pub(crate) const MERGE_REQUEST: &str = "merge_value";

const SYSTEM: &str = "You transform tabular data into a target schema. \
Answer with JSON only. `value` must be a single plain value (string, number, \
boolean or null), never a list or object.";

/// Answer shape shared by derive and merge requests.
#[derive(Debug, Deserialize)]
pub(crate) struct ValueAnswer {
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub value: Value,
}

fn value_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "reasoning": { "type": "string" },
            "value": { "type": ["string", "number", "boolean", "null"] }
        },
        "required": ["reasoning", "value"],
        "additionalProperties": false
    })
}

/// Target column context shown to the classifier.
pub(crate) struct ColumnContext<'a> {
    pub purpose: &'a str,
    pub column: &'a str,
    pub description: &'a str,
    pub supports_purpose_by: &'a str,
}

impl ColumnContext<'_> {
    fn describe(&self) -> String {
        let mut text = format!(
            "Target table purpose: {}\nTarget column: {}\nColumn description: {}",
            self.purpose, self.column, self.description
        );
        if !self.supports_purpose_by.is_empty() {
            text.push_str(&format!("\nSupports the purpose by: {}", self.supports_purpose_by));
        }
        text
    }
}

pub(crate) fn derive_request(
    context: &ColumnContext<'_>,
    sources: &[(String, String)],
    current: Option<&str>,
) -> ClassifierRequest {
    let sources: Map<String, Value> = sources
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    let mut prompt = format!(
        "{}\n\nSource values of the incoming row:\n{}\n",
        context.describe(),
        Value::Object(sources)
    );
    match current {
        Some(current) => prompt.push_str(&format!(
            "\nThe target row already holds: {current:?}\n\
             Produce the final value for the target column. Combine the existing value \
             with the new information where both add detail, prefer the more complete \
             information, and never drop existing facts without reason."
        )),
        None => prompt.push_str(
            "\nDerive the value for the target column from the source values. \
             Use null when the source values do not supply it.",
        ),
    }
    ClassifierRequest::new(
        DERIVE_REQUEST,
        vec![ChatMessage::system(SYSTEM), ChatMessage::user(prompt)],
        value_schema(),
    )
}

pub(crate) fn merge_request(
    context: &ColumnContext<'_>,
    existing: &str,
    incoming: &str,
) -> ClassifierRequest {
    let prompt = format!(
        "{}\n\nThe same entity was ingested twice and the two values differ.\n\
         Existing value: {existing:?}\nIncoming value: {incoming:?}\n\n\
         Return the value the target row should hold. Combine both when each adds \
         distinguishing detail, prefer the more complete information, and do not \
         blindly overwrite the existing value.",
        context.describe()
    );
    ClassifierRequest::new(
        MERGE_REQUEST,
        vec![ChatMessage::system(SYSTEM), ChatMessage::user(prompt)],
        value_schema(),
    )
}
