//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ClassifyError, Result};
use crate::request::{ChatMessage, Classifier, ClassifierRequest, parse_json_content};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Connection settings for [`OpenAiClassifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    /// Full chat-completions endpoint URL.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.1,
            request_timeout: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Blocking client for an OpenAI-compatible endpoint.
///
/// One HTTP client (and its connection pool) is shared by every call, so a
/// single instance can serve all executor workers.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClassifier {
    /// Builds a client, reading the API key from the configured variable.
    pub fn from_settings(settings: &ClassifierSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClassifyError::MissingKey {
                var: settings.api_key_env.clone(),
            })?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: &ClassifierSettings, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(ClassifyError::Client)?;
        Ok(Self {
            client,
            endpoint: settings.base_url.clone(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Classifier for OpenAiClassifier {
    fn classify(&self, request: &ClassifierRequest) -> Result<Value> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &request.name,
                    schema: &request.schema,
                },
            },
        };

        debug!(request = %request.name, model = %self.model, "sending classifier request");
        let network = |source: reqwest::Error| ClassifyError::Network {
            name: request.name.clone(),
            source,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|body| body.error.message)
                .unwrap_or(text);
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().map_err(network)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClassifyError::InvalidResponse("no choices in response".to_string()))?;
        parse_json_content(&content)
    }
}
