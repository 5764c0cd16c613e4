// src/types.rs

//! Shared value types for command execution.

use std::collections::BTreeMap;
use std::fmt;

/// Immutable description of one external command invocation.
///
/// Constructed by the caller, consumed by the process runner. The elevator
/// wraps a `CommandSpec` in its elevation helper before execution; callers
/// never add `sudo` themselves.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Environment overlay applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Payload written to the child's stdin, after which the stream is
    /// closed so the child sees EOF.
    pub stdin: Option<String>,
}

impl CommandSpec {
    /// Build a spec from program + arguments.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            stdin: None,
        }
    }

    /// Add one environment overlay entry.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the stdin payload.
    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// The program to execute, if the argv is non-empty.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

// Hand-written so the stdin payload (which may carry a secret fed to the
// elevation helper) never ends up in logs or panic messages.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("argv", &self.argv)
            .field("env", &self.env)
            .field(
                "stdin",
                &self.stdin.as_ref().map(|s| format!("<{} bytes>", s.len())),
            )
            .finish()
    }
}

/// Captured outcome of a synchronous command run.
///
/// A nonzero exit code is a normal value here, not an error: callers decide
/// whether nonzero is fatal for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_stdin_payload() {
        let spec = CommandSpec::new(["sudo", "-S", "-v"]).stdin("hunter2\n");
        let rendered = format!("{spec:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<8 bytes>"));
    }

    #[test]
    fn builder_sets_env_overlay() {
        let spec = CommandSpec::new(["apt-get", "install", "-y", "curl"])
            .env("DEBIAN_FRONTEND", "noninteractive");
        assert_eq!(spec.program(), Some("apt-get"));
        assert_eq!(
            spec.env.get("DEBIAN_FRONTEND").map(String::as_str),
            Some("noninteractive")
        );
    }
}
