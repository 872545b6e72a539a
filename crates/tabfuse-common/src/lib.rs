//! Shared utilities for tabfuse crates.

pub mod executor;
pub mod redact;
pub mod text;

// === Executor ===
pub use executor::{
    BoundedExecutor, ExecutorError, ExecutorOptions, ItemFailure, ItemOutcome, backoff_delay,
};

// === Logging ===
pub use redact::{REDACTED_VALUE, log_data_enabled, redact_value, set_log_data};

// === Text ===
pub use text::{normalize_identity, normalize_text};
