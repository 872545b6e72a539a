//! Runtime settings.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! or missing file yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabfuse_classify::ClassifierSettings;
use tabfuse_classify::openai::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use tabfuse_common::ExecutorOptions;
use tabfuse_transform::FailurePolicy;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

/// Overrides `classifier.transcript_dir` when set and non-empty.
pub const TRANSCRIPT_DIR_ENV: &str = "TABFUSE_TRANSCRIPT_DIR";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub classifier: ClassifierSection,
    pub executor: ExecutorSection,
    pub transform: TransformSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierSection {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_dir: Option<PathBuf>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: 0.1,
            request_timeout_secs: 60,
            transcript_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorSection {
    pub max_workers: usize,
    pub item_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_unit_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_workers: 5,
            item_timeout_secs: 30,
            max_retries: 3,
            backoff_unit_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformSection {
    pub failure_policy: FailurePolicy,
}

impl Settings {
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            max_workers: self.executor.max_workers,
            per_item_timeout: Duration::from_secs(self.executor.item_timeout_secs),
            max_retries: self.executor.max_retries,
            backoff_unit: Duration::from_millis(self.executor.backoff_unit_ms),
        }
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            base_url: self.classifier.base_url.clone(),
            model: self.classifier.model.clone(),
            api_key_env: self.classifier.api_key_env.clone(),
            temperature: self.classifier.temperature,
            request_timeout: Duration::from_secs(self.classifier.request_timeout_secs),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.transform.failure_policy
    }

    /// Transcript directory, with the environment override applied.
    pub fn transcript_dir(&self) -> Option<PathBuf> {
        std::env::var_os(TRANSCRIPT_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.classifier.transcript_dir.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.executor.max_workers == 0 {
            return Err(invalid("executor.max_workers", "must be at least 1"));
        }
        if self.executor.item_timeout_secs == 0 {
            return Err(invalid("executor.item_timeout_secs", "must be at least 1"));
        }
        if self.classifier.request_timeout_secs == 0 {
            return Err(invalid("classifier.request_timeout_secs", "must be at least 1"));
        }
        let temperature = self.classifier.temperature;
        if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
            return Err(invalid(
                "classifier.temperature",
                format!("must be within [0, 2], got {temperature}"),
            ));
        }
        if self.classifier.base_url.trim().is_empty() {
            return Err(invalid("classifier.base_url", "must not be empty"));
        }
        if self.classifier.api_key_env.trim().is_empty() {
            return Err(invalid("classifier.api_key_env", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        field,
        message: message.into(),
    }
}

/// Loads settings from `path`, or defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        debug!("no settings file given, using defaults");
        return Ok(Settings::default());
    };
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    let settings = parse_settings(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    info!(path = %path.display(), "loaded settings");
    Ok(settings)
}

fn parse_settings(contents: &str) -> std::result::Result<Settings, toml::de::Error> {
    toml::from_str(contents)
}
