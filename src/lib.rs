// src/lib.rs

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod queue;
pub mod runner;
pub mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::auth::{spawn_prompt_actor, CredentialBroker, TerminalPrompt};
use crate::cli::CliArgs;
use crate::config::Config;
use crate::errors::{PrivexecError, Result};
use crate::exec::{Elevator, PrivilegedExecutor, SudoElevator};
use crate::queue::{TaskEvent, TaskQueue};
use crate::types::CommandSpec;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the prompt actor (terminal backend)
/// - credential broker + privileged executor
/// - the task queue
///
/// and submits the requested command as a single queue task, printing
/// progress lines to stdout. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_config(&args)?;

    let prompt = spawn_prompt_actor(TerminalPrompt::new());
    let elevator: Arc<dyn Elevator> = Arc::new(
        SudoElevator::new().with_validation_timeout(cfg.validation_timeout()),
    );
    let broker = Arc::new(CredentialBroker::new(
        prompt,
        Arc::clone(&elevator),
        cfg.credential_ttl(),
    ));
    let executor = Arc::new(
        PrivilegedExecutor::new(broker, elevator).with_retry_budget(cfg.retry_budget()),
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TaskEvent>();
    let queue = TaskQueue::spawn_with_capacity(event_tx, cfg.command_capacity());

    let spec = CommandSpec::new(args.command.clone());
    let name = args.command.join(" ");
    let capture = args.capture;

    info!(task = %name, capture, "submitting privileged command");

    let task_id = queue
        .submit_fn(name, move |progress| async move {
            if capture {
                let result = executor.run_privileged(&spec).await?;
                for line in result.stdout.lines() {
                    progress.emit(line);
                }
                for line in result.stderr.lines() {
                    progress.emit(line);
                }
                anyhow::ensure!(
                    result.success(),
                    "command exited with code {}",
                    result.exit_code
                );
            } else {
                let code = executor
                    .run_privileged_streaming(&spec, |line| progress.emit(line))
                    .await?;
                anyhow::ensure!(code == 0, "command exited with code {code}");
            }
            Ok(())
        })
        .await?;

    while let Some(event) = event_rx.recv().await {
        match event {
            TaskEvent::Progress { id, message } if id == task_id => println!("{message}"),
            TaskEvent::Completed { id, success, error } if id == task_id => {
                if let Some(error) = error {
                    eprintln!("privexec: {error}");
                }
                return Ok(if success { 0 } else { 1 });
            }
            _ => {}
        }
    }

    Err(PrivexecError::QueueClosed)
}

/// Load the config file, falling back to defaults when the default path is
/// absent. An explicitly given path must exist.
fn load_config(args: &CliArgs) -> Result<Config> {
    let path = std::path::Path::new(&args.config);
    let is_default = args.config == config::default_config_path().as_os_str().to_string_lossy();

    if !path.exists() && is_default {
        debug!("no config file found; using built-in defaults");
        return Ok(Config::default());
    }

    config::load_and_validate(path)
}
