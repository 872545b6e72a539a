//! Request/response contract of the classification service.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClassifyError, Result};

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A structured classification request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierRequest {
    /// Short request kind, e.g. `column_profile`. Also names the response schema.
    pub name: String,
    pub messages: Vec<ChatMessage>,
    /// JSON schema the answer must follow.
    pub schema: Value,
}

impl ClassifierRequest {
    pub fn new(name: impl Into<String>, messages: Vec<ChatMessage>, schema: Value) -> Self {
        Self {
            name: name.into(),
            messages,
            schema,
        }
    }

    /// Content of the last user message, or the empty string.
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map_or("", |message| message.content.as_str())
    }
}

/// Narrow capability: structured request in, structured answer out.
///
/// Implementations must be safe to call from several executor workers at once.
pub trait Classifier: Send + Sync {
    fn classify(&self, request: &ClassifierRequest) -> Result<Value>;
}

impl<C: Classifier + ?Sized> Classifier for Arc<C> {
    fn classify(&self, request: &ClassifierRequest) -> Result<Value> {
        (**self).classify(request)
    }
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&self, request: &ClassifierRequest) -> Result<Value> {
        (**self).classify(request)
    }
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn classify(&self, request: &ClassifierRequest) -> Result<Value> {
        (**self).classify(request)
    }
}

/// Sends `request` and deserializes the answer into `T`.
pub fn classify_as<T, C>(classifier: &C, request: &ClassifierRequest) -> Result<T>
where
    T: DeserializeOwned,
    C: Classifier + ?Sized,
{
    let value = classifier.classify(request)?;
    serde_json::from_value(value).map_err(|source| ClassifyError::Schema {
        name: request.name.clone(),
        source,
    })
}

/// Parses message content as JSON, tolerating prose or markdown fences
/// around a single JSON object.
pub fn parse_json_content(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| ClassifyError::Parse(format!("{e}; content: {trimmed}"))),
        _ => Err(ClassifyError::Parse(format!("no JSON object in: {trimmed}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_json() {
        let value = parse_json_content(r#"{"value": "x"}"#).unwrap();
        assert_eq!(value, json!({"value": "x"}));
    }

    #[test]
    fn parses_json_inside_markdown() {
        let content = "Here you go:\n```json\n{\"reasoning\": \"ok\", \"transformation_type\": \"none\"}\n```";
        let value = parse_json_content(content).unwrap();
        assert_eq!(value["transformation_type"], "none");
    }

    #[test]
    fn rejects_content_without_object() {
        assert!(matches!(
            parse_json_content("no idea"),
            Err(ClassifyError::Parse(_))
        ));
    }

    #[test]
    fn user_prompt_is_last_user_message() {
        let request = ClassifierRequest::new(
            "t",
            vec![
                ChatMessage::system("rules"),
                ChatMessage::user("first"),
                ChatMessage::user("second"),
            ],
            json!({}),
        );
        assert_eq!(request.user_prompt(), "second");
    }
}
