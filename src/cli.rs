// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `privexec`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "privexec",
    version,
    about = "Run a privileged command through a serialized task queue.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Privexec.toml` in the current working directory. A missing
    /// file at the default path falls back to built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Privexec.toml")]
    pub config: String,

    /// Capture output and print it after exit instead of streaming lines.
    #[arg(long)]
    pub capture: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PRIVEXEC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// The command to run with elevated privileges.
    #[arg(required = true, trailing_var_arg = true, value_name = "CMD")]
    pub command: Vec<String>,
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

/// Parse CLI arguments from the process environment.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
