//! Fake elevation mechanism for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use privexec::errors::{PrivexecError, Result};
use privexec::exec::{Elevator, LineSink};
use privexec::types::{CommandSpec, ExecutionResult};

/// An elevator that never spawns processes:
/// - validates secrets against a configured accepted value
/// - records every executed spec and counts validate/execute calls
/// - emits scripted lines in streaming mode.
///
/// Clones share the counters, so a test can keep a handle while the
/// executor owns the elevator.
#[derive(Debug, Clone)]
pub struct FakeElevator {
    elevated: bool,
    accepted: Option<String>,
    timeout_validation: bool,
    stream_lines: Vec<String>,
    exit_code: i32,
    validate_calls: Arc<AtomicUsize>,
    exec_calls: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<CommandSpec>>>,
}

impl FakeElevator {
    fn base() -> Self {
        Self {
            elevated: false,
            accepted: None,
            timeout_validation: false,
            stream_lines: Vec::new(),
            exit_code: 0,
            validate_calls: Arc::new(AtomicUsize::new(0)),
            exec_calls: Arc::new(AtomicUsize::new(0)),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Accepts exactly this secret; rejects everything else.
    pub fn accepting(secret: &str) -> Self {
        Self {
            accepted: Some(secret.to_string()),
            ..Self::base()
        }
    }

    /// Rejects every secret.
    pub fn rejecting_all() -> Self {
        Self::base()
    }

    /// Reports the process as already running elevated.
    pub fn already_elevated() -> Self {
        Self {
            elevated: true,
            ..Self::base()
        }
    }

    /// Every validation probe times out instead of answering.
    pub fn timing_out() -> Self {
        Self {
            timeout_validation: true,
            ..Self::base()
        }
    }

    /// Lines emitted (in order) by `execute_streaming`.
    pub fn with_stream_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stream_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Exit code reported by both execute modes.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn exec_calls(&self) -> usize {
        self.exec_calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<CommandSpec> {
        self.executed.lock().unwrap().clone()
    }
}

impl Elevator for FakeElevator {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn validate<'a>(
        &'a self,
        secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = if self.timeout_validation {
            Err(PrivexecError::ValidationTimeout(Duration::from_secs(5)))
        } else {
            Ok(self.accepted.as_deref() == Some(secret))
        };
        Box::pin(async move { outcome })
    }

    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        _secret: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ExecutionResult>> + Send + 'a>> {
        self.exec_calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(spec.clone());
        let result = ExecutionResult {
            exit_code: self.exit_code,
            stdout: self.stream_lines.join("\n"),
            stderr: String::new(),
        };
        Box::pin(async move { Ok(result) })
    }

    fn execute_streaming<'a>(
        &'a self,
        spec: &'a CommandSpec,
        _secret: &'a str,
        on_line: LineSink<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<i32>> + Send + 'a>> {
        self.exec_calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(spec.clone());
        for line in &self.stream_lines {
            on_line(line);
        }
        let code = self.exit_code;
        Box::pin(async move { Ok(code) })
    }
}
