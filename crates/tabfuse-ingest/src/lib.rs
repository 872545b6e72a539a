//! Table loading and writing for tabfuse.
//!
//! Source and target tables live on disk as CSV. This crate loads them into
//! the in-memory [`tabfuse_model::Dataset`] (with Polars doing the parsing and
//! per-column type inference) and writes the merged result back.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use tabfuse_ingest::{read_dataset, read_dataset_or_empty, write_dataset};
//!
//! let source = read_dataset(Path::new("leads.csv"))?;
//! let target = read_dataset_or_empty(Path::new("crm.csv"), &["email".to_string()])?;
//! write_dataset(&target, Path::new("crm.csv"))?;
//! ```

mod error;
mod reader;
mod writer;

// === Error Types ===
pub use error::{IngestError, Result};

// === Reading ===
pub use reader::{
    CellTyping, cell_from_any_value, read_dataset, read_dataset_or_empty, read_dataset_with,
};

// === Writing ===
pub use writer::write_dataset;
