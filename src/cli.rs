// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::CaseSetting;

/// Command-line arguments for `depwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "depwatch",
    version,
    about = "Watch entry files and everything they reference; report which entries each change affects.",
    long_about = None
)]
pub struct CliArgs {
    /// Entry files or glob patterns. Replaces `[watch].entries` from the
    /// config file when given.
    #[arg(value_name = "ENTRY")]
    pub entries: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Depwatch.toml` in the current working directory. A missing
    /// default config is not an error when entries are given.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Path identity rules; overrides `[watch].case_sensitive`.
    #[arg(long, value_enum, value_name = "MODE")]
    pub case_sensitive: Option<CaseSetting>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DEPWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build the graph once, print entries and the register, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Build the graph once, print it in Graphviz DOT format, then exit.
    #[arg(long)]
    pub dot: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
