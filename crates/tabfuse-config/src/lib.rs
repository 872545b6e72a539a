//! Configuration for tabfuse: schema documents and runtime settings.

mod document;
mod error;
mod settings;

// === Errors ===
pub use error::{ConfigError, Result};

// === Schema documents ===
pub use document::{DEFAULT_SAMPLE_ROWS, SchemaDocument, load_schema_document};

// === Settings ===
pub use settings::{
    ClassifierSection, ExecutorSection, Settings, TRANSCRIPT_DIR_ENV, TransformSection,
    load_settings,
};
