// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrivexecError {
    /// The binary could not be started at all (missing, not executable).
    /// Distinct from a command that ran and exited nonzero, which is
    /// reported as a value in `ExecutionResult`.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The credential validation probe did not finish within its timeout.
    /// Consumes one retry attempt; the cached secret is cleared.
    #[error("credential validation timed out after {0:?}")]
    ValidationTimeout(Duration),

    /// The user declined the interactive prompt.
    #[error("authentication cancelled by user")]
    AuthCancelled,

    /// Every attempt within the retry budget failed validation.
    #[error("maximum credential retries exceeded")]
    MaxRetriesExceeded,

    /// The prompt actor has shut down; no interactive surface is available.
    #[error("interactive prompt is unavailable")]
    PromptUnavailable,

    /// The task queue actor has shut down.
    #[error("task queue is no longer running")]
    QueueClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PrivexecError>;
