use std::path::PathBuf;

use tabfuse_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported schema document format {path} (expected .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid schema in {path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("failed to serialize schema document: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid setting {field}: {message}")]
    InvalidSetting { field: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
