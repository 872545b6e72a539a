//! tabfuse command-line entry point.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::{ColorChoice, Parser};
use serde_json::json;
use tabfuse_cli::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use tabfuse_cli::commands::{run_ingest, run_init_schema, run_plan, run_profile};
use tabfuse_cli::logging::{LogConfig, LogFormat, init_logging};
use tracing::level_filters::LevelFilter;

mod summary;

use crate::summary::{print_profile, print_profile_table, print_report, print_strategy};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    let settings = cli.settings.as_deref();
    match &cli.command {
        Command::Ingest(args) => {
            let result = run_ingest(args, settings)?;
            print_report(&result);
            Ok(0)
        }
        Command::Profile(args) => {
            let outcome = run_profile(args, settings)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome.profile)?);
            } else {
                print_profile(&outcome);
            }
            Ok(if outcome.is_complete() { 0 } else { 2 })
        }
        Command::Plan(args) => {
            let (profile, strategy) = run_plan(args, settings)?;
            if args.json {
                let body = json!({ "profile": profile, "strategy": strategy });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_profile_table(&profile);
                print_strategy(&strategy);
            }
            Ok(0)
        }
        Command::InitSchema(args) => {
            if let Some(text) = run_init_schema(args)? {
                print!("{text}");
            }
            Ok(0)
        }
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        log_data: cli.log_data,
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
