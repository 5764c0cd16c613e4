// src/exec/elevator.rs

//! Elevation mechanism boundary.
//!
//! The [`Elevator`] trait abstracts the `sudo`-like helper: it must offer a
//! validate-only mode (a side-effect-free probe that a secret is accepted)
//! distinct from execute mode (run a command elevated, secret on stdin).
//! Production code uses [`SudoElevator`]; tests substitute a fake that
//! counts calls and never spawns processes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::{PrivexecError, Result};
use crate::runner;
use crate::types::{CommandSpec, ExecutionResult};

/// Callback invoked once per completed output line.
pub type LineSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Default upper bound on the validation probe.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait abstracting the external elevation helper.
pub trait Elevator: Send + Sync + std::fmt::Debug {
    /// Whether the current process already runs with the elevated identity.
    /// When true the whole broker/validation machinery is bypassed.
    fn is_elevated(&self) -> bool;

    /// Validate-only mode: confirm the secret is accepted without running
    /// any command. Must finish within a short timeout.
    fn validate<'a>(
        &'a self,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Execute mode, captured: run `spec` elevated and return the full result.
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionResult>> + Send + 'a>>;

    /// Execute mode, streamed: run `spec` elevated, forwarding output lines.
    fn execute_streaming<'a>(
        &'a self,
        spec: &'a CommandSpec,
        secret: &'a str,
        on_line: LineSink<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + 'a>>;
}

/// Real elevator built on `sudo`.
///
/// - Probe: `sudo -S -v -p ""` — reads the password from stdin, validates
///   and refreshes the sudo timestamp, runs nothing.
/// - Execute: `sudo -S -p "" <argv...>` — password on the first stdin line,
///   any caller stdin payload after it.
#[derive(Debug, Clone)]
pub struct SudoElevator {
    validation_timeout: Duration,
}

impl SudoElevator {
    pub fn new() -> Self {
        Self {
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Wrap a spec so it runs under sudo with the secret fed on stdin.
    fn wrap(&self, spec: &CommandSpec, secret: &str) -> CommandSpec {
        let mut argv: Vec<String> = vec![
            "sudo".to_string(),
            "-S".to_string(),
            "-p".to_string(),
            String::new(),
        ];
        argv.extend(spec.argv.iter().cloned());

        // Password first; the command's own stdin payload (if any) follows.
        let mut stdin = format!("{secret}\n");
        if let Some(payload) = &spec.stdin {
            stdin.push_str(payload);
        }

        CommandSpec {
            argv,
            env: spec.env.clone(),
            stdin: Some(stdin),
        }
    }
}

impl Default for SudoElevator {
    fn default() -> Self {
        Self::new()
    }
}

impl Elevator for SudoElevator {
    fn is_elevated(&self) -> bool {
        // geteuid cannot fail and has no preconditions.
        unsafe { libc::geteuid() == 0 }
    }

    fn validate<'a>(
        &'a self,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        Box::pin(async move {
            let probe = CommandSpec::new(["sudo", "-S", "-v", "-p", ""])
                .stdin(format!("{secret}\n"));

            match tokio::time::timeout(self.validation_timeout, runner::run(&probe)).await {
                Ok(Ok(result)) => Ok(result.success()),
                Ok(Err(err)) => Err(err),
                Err(_elapsed) => Err(PrivexecError::ValidationTimeout(self.validation_timeout)),
            }
        })
    }

    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionResult>> + Send + 'a>> {
        Box::pin(async move {
            let wrapped = self.wrap(spec, secret);
            runner::run(&wrapped).await
        })
    }

    fn execute_streaming<'a>(
        &'a self,
        spec: &'a CommandSpec,
        secret: &'a str,
        on_line: LineSink<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + 'a>> {
        Box::pin(async move {
            let wrapped = self.wrap(spec, secret);
            runner::run_streaming(&wrapped, on_line).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_prefixes_sudo_and_feeds_secret_first() {
        let elevator = SudoElevator::new();
        let spec = CommandSpec::new(["apt-get", "update"]).stdin("y\n");
        let wrapped = elevator.wrap(&spec, "s3cret");

        assert_eq!(
            wrapped.argv,
            vec!["sudo", "-S", "-p", "", "apt-get", "update"]
        );
        assert_eq!(wrapped.stdin.as_deref(), Some("s3cret\ny\n"));
    }
}
