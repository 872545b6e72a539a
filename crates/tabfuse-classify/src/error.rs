//! Error types for classifier calls.

use thiserror::Error;

/// Errors raised by a [`crate::Classifier`].
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The API key environment variable is unset or empty.
    #[error("API key not found: set the {var} environment variable")]
    MissingKey { var: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request did not complete.
    #[error("request '{name}' failed: {source}")]
    Network {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The answer was not valid JSON.
    #[error("could not parse classifier answer: {0}")]
    Parse(String),

    /// The answer had no usable content.
    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),

    /// The JSON answer did not fit the expected shape.
    #[error("answer to '{name}' does not match the expected shape: {source}")]
    Schema {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// Any other service-side failure.
    #[error("classification service error: {0}")]
    Service(String),
}

/// Result type for classifier calls.
pub type Result<T> = std::result::Result<T, ClassifyError>;
