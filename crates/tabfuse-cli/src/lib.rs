//! CLI library components for tabfuse.

pub mod cli;
pub mod commands;
pub mod logging;
