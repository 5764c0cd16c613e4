// src/exec/mod.rs

//! Privileged executor: validate-then-execute with a bounded retry loop.
//!
//! Both entry points follow the same protocol:
//! - already elevated → delegate straight to the process runner, no broker;
//! - otherwise acquire a credential (re-prompting on later attempts), run
//!   the elevator's side-effect-free validation probe, and only execute the
//!   real command once a probe has accepted the secret.
//!
//! A wrong secret therefore costs a failed probe, never a half-applied
//! privileged operation. The real command's own exit code is a normal
//! result; only authentication problems are errors here.

pub mod elevator;
pub mod redact;

use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::auth::CredentialBroker;
use crate::errors::{PrivexecError, Result};
use crate::runner;
use crate::types::{CommandSpec, ExecutionResult};

pub use elevator::{Elevator, LineSink, SudoElevator, DEFAULT_VALIDATION_TIMEOUT};

/// Default number of credential attempts per logical privileged operation.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Executor for commands that require elevation.
#[derive(Debug, Clone)]
pub struct PrivilegedExecutor {
    broker: Arc<CredentialBroker>,
    elevator: Arc<dyn Elevator>,
    retry_budget: u32,
}

impl PrivilegedExecutor {
    pub fn new(broker: Arc<CredentialBroker>, elevator: Arc<dyn Elevator>) -> Self {
        Self {
            broker,
            elevator,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Run a privileged command, capturing stdout/stderr.
    pub async fn run_privileged(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        if self.elevator.is_elevated() {
            debug!("already elevated; running command directly");
            return runner::run(spec).await;
        }

        let mut quiet = |_line: &str| {};
        let secret = self.authenticate(&mut quiet).await?;

        info!(
            program = spec.program().unwrap_or("<empty>"),
            "credential validated; executing privileged command"
        );
        self.elevator.execute(spec, &secret).await
    }

    /// Run a privileged command, streaming output lines as they arrive.
    ///
    /// Authentication breadcrumbs (`[auth] ...`, `[error] ...`) are emitted
    /// through the same callback so a multi-minute operation shows progress
    /// from the first prompt onward. Every forwarded line is scrubbed of
    /// the secret. Returns the command's exit code; a nonzero code is a
    /// value, not an error.
    pub async fn run_privileged_streaming<F>(
        &self,
        spec: &CommandSpec,
        mut on_line: F,
    ) -> Result<i32>
    where
        F: FnMut(&str) + Send,
    {
        if self.elevator.is_elevated() {
            on_line("[info] Running with root privileges...");
            return runner::run_streaming(spec, on_line).await;
        }

        let secret = self.authenticate(&mut on_line).await?;
        on_line("[auth] Credentials validated. Starting operation...");

        info!(
            program = spec.program().unwrap_or("<empty>"),
            "credential validated; streaming privileged command"
        );

        let code = {
            let mut scrubbed = |line: &str| {
                let clean = redact::scrub(line, &secret);
                on_line(&clean);
            };
            self.elevator
                .execute_streaming(spec, &secret, &mut scrubbed)
                .await?
        };

        if code != 0 {
            on_line(&format!("[error] Command failed with exit code {code}"));
        }

        Ok(code)
    }

    /// The bounded acquire → validate loop.
    ///
    /// Each rejected or timed-out probe consumes one attempt and leaves the
    /// broker's cache cleared, so the next iteration re-prompts with the
    /// "try again" wording. Returns the accepted secret.
    async fn authenticate(
        &self,
        notify: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Zeroizing<String>> {
        for attempt in 0..self.retry_budget {
            let Some(secret) = self.broker.acquire(attempt > 0).await? else {
                notify("[error] Authentication cancelled.");
                return Err(PrivexecError::AuthCancelled);
            };

            notify("[auth] Validating credentials...");
            match self.broker.validate().await {
                Ok(true) => return Ok(secret),
                Ok(false) => {
                    warn!(attempt, "credential rejected by validation probe");
                    notify("[error] Incorrect password.");
                }
                Err(PrivexecError::ValidationTimeout(timeout)) => {
                    warn!(attempt, ?timeout, "validation probe timed out");
                    notify("[error] Password validation timed out.");
                }
                Err(err) => return Err(err),
            }
        }

        notify("[error] Maximum password retries exceeded.");
        Err(PrivexecError::MaxRetriesExceeded)
    }
}
