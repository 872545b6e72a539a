//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use tabfuse_transform::FailurePolicy;

#[derive(Parser)]
#[command(
    name = "tabfuse",
    version,
    about = "Merge incoming tables into a target table, one entity per row",
    long_about = "Map an incoming CSV onto a declared target schema and merge it into \
                  the target table.\n\n\
                  Rows describing an entity already present in the target are merged \
                  into that row; other rows are appended."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include row values in logs. Identity columns usually hold personal data.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// Runtime settings file (TOML).
    #[arg(long = "settings", value_name = "PATH", global = true)]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Map a source table onto the schema and merge it into the target table.
    Ingest(IngestArgs),

    /// Profile the columns of a table.
    Profile(ProfileArgs),

    /// Show the mapping strategy for a source table without ingesting it.
    Plan(PlanArgs),

    /// Write a starter schema document from a table's header.
    InitSchema(InitSchemaArgs),
}

#[derive(Parser)]
pub struct IngestArgs {
    /// Schema document (.toml or .json).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Incoming table (CSV).
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Target table (default: the schema's target_file_path).
    #[arg(long = "target", value_name = "PATH")]
    pub target: Option<PathBuf>,

    /// Where to write the merged table (default: the target table).
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Override the settings' failure policy.
    #[arg(long = "failure-policy", value_enum)]
    pub failure_policy: Option<FailurePolicyArg>,

    /// Run everything but do not write the merged table.
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct ProfileArgs {
    /// Table to profile (CSV).
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// What the data is for; given to the classifier as context.
    #[arg(long = "purpose", value_name = "TEXT")]
    pub purpose: String,

    /// Distinct sample values shown per column.
    #[arg(long = "sample-rows", value_name = "N", default_value_t = 5)]
    pub sample_rows: usize,

    /// Print JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Schema document (.toml or .json).
    #[arg(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Incoming table (CSV).
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Print JSON instead of tables.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitSchemaArgs {
    /// Table whose header supplies the column names (CSV).
    #[arg(value_name = "TABLE")]
    pub table: PathBuf,

    /// Purpose statement of the target table.
    #[arg(value_name = "PURPOSE")]
    pub purpose: String,

    /// Write to this file instead of stdout.
    #[arg(long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing output file.
    #[arg(long = "force")]
    pub force: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FailurePolicyArg {
    Strict,
    Lenient,
}

impl From<FailurePolicyArg> for FailurePolicy {
    fn from(value: FailurePolicyArg) -> Self {
        match value {
            FailurePolicyArg::Strict => Self::Strict,
            FailurePolicyArg::Lenient => Self::Lenient,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
