// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `sympack`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sympack",
    version,
    about = "Rebuild, pack and install a package into other projects whenever its sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the shared config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Sympack.toml")]
    pub config: String,

    /// Path to the machine-local config overlay (TOML).
    ///
    /// Holds per-machine project paths; it is optional for `global` scope.
    #[arg(long, value_name = "PATH", default_value = "Sympack.local.toml")]
    pub local_config: String,

    /// Run the pipeline once, clean up and exit instead of watching.
    #[arg(long)]
    pub once: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SYMPACK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load + validate config, print the pipeline, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
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
