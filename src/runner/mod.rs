// src/runner/mod.rs

//! Process runner: the only module that touches the OS process-creation API.
//!
//! Two entry points:
//! - [`run`] spawns a command, captures both streams, and returns the full
//!   [`ExecutionResult`] once the child exits.
//! - [`run_streaming`] spawns a command and invokes a callback once per
//!   completed output line, merging stdout and stderr in arrival order, then
//!   returns the exit code.
//!
//! A nonzero exit code is reported as a value in both variants; only a
//! failure to start the process at all surfaces as [`PrivexecError::Spawn`].

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{PrivexecError, Result};
use crate::types::{CommandSpec, ExecutionResult};

/// Run a command to completion, capturing stdout and stderr.
pub async fn run(spec: &CommandSpec) -> Result<ExecutionResult> {
    let mut child = spawn(spec, Stdio::piped(), Stdio::piped())?;
    feed_stdin(&mut child, spec);

    let output = child.wait_with_output().await?;
    let exit_code = output.status.code().unwrap_or(-1);

    debug!(
        program = spec.program().unwrap_or("<empty>"),
        exit_code, "command exited"
    );

    Ok(ExecutionResult {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command, invoking `on_line` once per completed output line.
///
/// Stdout and stderr are merged in arrival order, so interleaved progress
/// and diagnostics from tools like `apt-get` read the way a terminal would
/// show them. Blocks until the child exits; returns its exit code.
pub async fn run_streaming<F>(spec: &CommandSpec, mut on_line: F) -> Result<i32>
where
    F: FnMut(&str) + Send,
{
    let mut child = spawn(spec, Stdio::piped(), Stdio::piped())?;
    feed_stdin(&mut child, spec);

    // Both readers feed the same channel; the channel closes once both
    // senders are dropped (streams hit EOF).
    let (line_tx, mut line_rx) = mpsc::channel::<String>(64);

    if let Some(stdout) = child.stdout.take() {
        let tx = line_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let tx = line_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }

    drop(line_tx);

    while let Some(line) = line_rx.recv().await {
        on_line(&line);
    }

    let status = child.wait().await?;
    let exit_code = status.code().unwrap_or(-1);

    debug!(
        program = spec.program().unwrap_or("<empty>"),
        exit_code, "streamed command exited"
    );

    Ok(exit_code)
}

/// Spawn the child process for a spec.
fn spawn(spec: &CommandSpec, stdout: Stdio, stderr: Stdio) -> Result<Child> {
    let Some(program) = spec.program() else {
        return Err(PrivexecError::Spawn {
            program: String::new(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty argv",
            ),
        });
    };

    let mut cmd = Command::new(program);
    cmd.args(&spec.argv[1..])
        .envs(&spec.env)
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    cmd.stdin(if spec.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    cmd.spawn().map_err(|source| PrivexecError::Spawn {
        program: program.to_string(),
        source,
    })
}

/// Write the stdin payload (if any) and close the stream so the child sees
/// EOF. Done on a separate task so a child that never reads stdin cannot
/// deadlock against output capture.
fn feed_stdin(child: &mut Child, spec: &CommandSpec) {
    let Some(payload) = spec.stdin.clone() else {
        return;
    };
    let Some(mut stdin) = child.stdin.take() else {
        return;
    };

    tokio::spawn(async move {
        if let Err(err) = stdin.write_all(payload.as_bytes()).await {
            // Broken pipe is normal for children that exit without reading.
            warn!(error = %err, "failed to write stdin payload to child");
        }
        // Dropping the handle closes the pipe.
    });
}
