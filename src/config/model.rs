// src/config/model.rs

//! Configuration data model.
//!
//! `RawConfig` is what serde deserializes from TOML; `Config` is the
//! validated form the rest of the application consumes. Conversion happens
//! via `TryFrom` in [`crate::config::validate`].

use std::time::Duration;

use serde::Deserialize;

/// `[auth]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Credential attempts per logical privileged operation.
    pub retry_budget: u32,
    /// Seconds a cached credential stays usable after its last successful
    /// validation or prompt.
    pub credential_ttl_secs: u64,
    /// Upper bound in seconds on the validation probe (must stay ≤ 5).
    pub validation_timeout_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            credential_ttl_secs: 5 * 60,
            validation_timeout_secs: 5,
        }
    }
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSection {
    /// Capacity of the queue's command channel.
    pub command_capacity: usize,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            command_capacity: 64,
        }
    }
}

/// Raw, unvalidated config as read from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub auth: AuthSection,
    pub queue: QueueSection,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    auth: AuthSection,
    queue: QueueSection,
}

impl Config {
    /// Construct without re-validating; only `validate` calls this.
    pub(crate) fn new_unchecked(auth: AuthSection, queue: QueueSection) -> Self {
        Self { auth, queue }
    }

    pub fn retry_budget(&self) -> u32 {
        self.auth.retry_budget
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.credential_ttl_secs)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.validation_timeout_secs)
    }

    pub fn command_capacity(&self) -> usize {
        self.queue.command_capacity
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthSection::default(),
            queue: QueueSection::default(),
        }
    }
}
