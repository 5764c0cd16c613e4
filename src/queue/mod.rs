// src/queue/mod.rs

//! Sequential task queue.
//!
//! A single actor task owns all task state and is the only place a task is
//! ever started: commands come in over an mpsc channel, lifecycle events go
//! out over an unbounded channel. At most one worker executes a task body
//! at any instant; submission order equals start order (strict FIFO over
//! pending tasks).
//!
//! The event channel is unbounded on purpose: `ProgressSink::emit` must be
//! callable from synchronous line callbacks deep inside the process runner,
//! and `Added` must be observably emitted before `submit` returns. With a
//! single running worker the production rate is already bounded.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::errors::{PrivexecError, Result};

/// Opaque task identity, assigned by the queue in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Cancelled while still pending; never reached from `Running`.
    Cancelled,
}

impl TaskStatus {
    /// Completed or Failed — the states `clear_completed` sweeps.
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Lifecycle events published by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Emitted synchronously before `submit` returns.
    Added { id: TaskId, name: String },
    /// The task was promoted to `Running` and its worker started.
    Started { id: TaskId },
    /// The task body emitted a progress message, in emission order.
    Progress { id: TaskId, message: String },
    /// The task finished, successfully or not.
    Completed {
        id: TaskId,
        success: bool,
        error: Option<String>,
    },
    /// A pending task was cancelled before it ever started.
    Cancelled { id: TaskId },
}

/// Read-only view of a task for display (no work closure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub error: Option<String>,
}

/// Progress emitter handed to each task body.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    id: TaskId,
    events: mpsc::UnboundedSender<TaskEvent>,
}

impl ProgressSink {
    /// Emit one progress message tagged with this task's id.
    pub fn emit(&self, message: impl Into<String>) {
        let _ = self.events.send(TaskEvent::Progress {
            id: self.id,
            message: message.into(),
        });
    }
}

/// Boxed future returned by a task body.
pub type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A unit of work: runs once, reporting progress through the sink.
pub type WorkFn = Box<dyn FnOnce(ProgressSink) -> WorkFuture + Send>;

enum QueueCommand {
    Submit {
        name: String,
        work: WorkFn,
        reply: oneshot::Sender<TaskId>,
    },
    CancelPending {
        id: TaskId,
        reply: oneshot::Sender<bool>,
    },
    ClearCompleted {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<TaskView>>,
    },
    Lookup {
        id: TaskId,
        reply: oneshot::Sender<Option<TaskView>>,
    },
}

/// Cloneable handle to the queue actor.
///
/// The actor exits once every handle has been dropped and the running
/// worker (if any) has finished.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<QueueCommand>,
}

impl TaskQueue {
    /// Spawn the queue actor. Lifecycle events are delivered on `events`.
    pub fn spawn(events: mpsc::UnboundedSender<TaskEvent>) -> Self {
        Self::spawn_with_capacity(events, 64)
    }

    /// Spawn the queue actor with an explicit command-channel capacity.
    pub fn spawn_with_capacity(
        events: mpsc::UnboundedSender<TaskEvent>,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<QueueCommand>(capacity);
        tokio::spawn(queue_loop(rx, events));
        Self { tx }
    }

    /// Append a task and start it immediately if the queue is idle.
    ///
    /// The `Added` event is emitted before this returns.
    pub async fn submit(&self, name: impl Into<String>, work: WorkFn) -> Result<TaskId> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(QueueCommand::Submit {
                name: name.into(),
                work,
                reply,
            })
            .await
            .map_err(|_| PrivexecError::QueueClosed)?;
        response.await.map_err(|_| PrivexecError::QueueClosed)
    }

    /// Convenience wrapper for async closures.
    pub async fn submit_fn<F, Fut>(&self, name: impl Into<String>, work: F) -> Result<TaskId>
    where
        F: FnOnce(ProgressSink) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.submit(name, Box::new(move |sink| Box::pin(work(sink))))
            .await
    }

    /// Cancel a task that has not started yet. Returns whether a pending
    /// task was actually cancelled; running or finished tasks are left
    /// untouched.
    pub async fn cancel_pending(&self, id: TaskId) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(QueueCommand::CancelPending { id, reply })
            .await
            .map_err(|_| PrivexecError::QueueClosed)?;
        response.await.map_err(|_| PrivexecError::QueueClosed)
    }

    /// Remove all (and only) `Completed`/`Failed` tasks; returns how many
    /// were removed.
    pub async fn clear_completed(&self) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(QueueCommand::ClearCompleted { reply })
            .await
            .map_err(|_| PrivexecError::QueueClosed)?;
        response.await.map_err(|_| PrivexecError::QueueClosed)
    }

    /// Current view of every task, in submission order.
    pub async fn snapshot(&self) -> Result<Vec<TaskView>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(QueueCommand::Snapshot { reply })
            .await
            .map_err(|_| PrivexecError::QueueClosed)?;
        response.await.map_err(|_| PrivexecError::QueueClosed)
    }

    /// Current view of one task, or `None` if it was never submitted or has
    /// been swept by `clear_completed`.
    pub async fn task(&self, id: TaskId) -> Result<Option<TaskView>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(QueueCommand::Lookup { id, reply })
            .await
            .map_err(|_| PrivexecError::QueueClosed)?;
        response.await.map_err(|_| PrivexecError::QueueClosed)
    }
}

struct TaskRecord {
    id: TaskId,
    name: String,
    status: TaskStatus,
    error: Option<String>,
    /// Taken when the task is promoted.
    work: Option<WorkFn>,
}

struct QueueState {
    events: mpsc::UnboundedSender<TaskEvent>,
    done_tx: mpsc::Sender<(TaskId, std::result::Result<(), String>)>,
    tasks: Vec<TaskRecord>,
    running: Option<TaskId>,
    next_id: u64,
}

async fn queue_loop(
    mut cmd_rx: mpsc::Receiver<QueueCommand>,
    events: mpsc::UnboundedSender<TaskEvent>,
) {
    info!("task queue loop started");

    // Workers report completion on a separate internal channel so the actor
    // itself holds no clone of the public command sender (which would keep
    // the loop alive after every handle is dropped).
    let (done_tx, mut done_rx) = mpsc::channel::<(TaskId, std::result::Result<(), String>)>(8);

    let mut state = QueueState {
        events,
        done_tx,
        tasks: Vec::new(),
        running: None,
        next_id: 0,
    };

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => state.handle_command(cmd),
                None => break,
            },
            Some((id, outcome)) = done_rx.recv() => {
                state.handle_finished(id, outcome);
            }
        }
    }

    // All handles dropped; drain remaining work so already-accepted tasks
    // still run to completion before the actor exits.
    while state.running.is_some() {
        match done_rx.recv().await {
            Some((id, outcome)) => state.handle_finished(id, outcome),
            None => break,
        }
    }

    info!("task queue loop finished (all handles dropped)");
}

impl QueueState {
    fn handle_command(&mut self, cmd: QueueCommand) {
        match cmd {
            QueueCommand::Submit { name, work, reply } => {
                self.next_id += 1;
                let id = TaskId(self.next_id);

                info!(%id, task = %name, "task added");
                self.tasks.push(TaskRecord {
                    id,
                    name: name.clone(),
                    status: TaskStatus::Pending,
                    error: None,
                    work: Some(work),
                });

                // Added must be observable before submit() returns, so it
                // goes out before the reply.
                self.emit(TaskEvent::Added { id, name });
                let _ = reply.send(id);

                self.maybe_start_next();
            }
            QueueCommand::CancelPending { id, reply } => {
                let cancelled = self.cancel_pending(id);
                let _ = reply.send(cancelled);
            }
            QueueCommand::ClearCompleted { reply } => {
                let before = self.tasks.len();
                self.tasks.retain(|t| !t.status.is_finished());
                let removed = before - self.tasks.len();
                debug!(removed, "cleared completed tasks");
                let _ = reply.send(removed);
            }
            QueueCommand::Snapshot { reply } => {
                let view = self
                    .tasks
                    .iter()
                    .map(|t| TaskView {
                        id: t.id,
                        name: t.name.clone(),
                        status: t.status,
                        error: t.error.clone(),
                    })
                    .collect();
                let _ = reply.send(view);
            }
            QueueCommand::Lookup { id, reply } => {
                let view = self.tasks.iter().find(|t| t.id == id).map(|t| TaskView {
                    id: t.id,
                    name: t.name.clone(),
                    status: t.status,
                    error: t.error.clone(),
                });
                let _ = reply.send(view);
            }
        }
    }

    fn cancel_pending(&mut self, id: TaskId) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if task.status != TaskStatus::Pending {
            debug!(%id, status = ?task.status, "cancel ignored; task not pending");
            return false;
        }

        task.status = TaskStatus::Cancelled;
        task.work = None;
        info!(%id, task = %task.name, "pending task cancelled");
        self.emit(TaskEvent::Cancelled { id });
        true
    }

    fn handle_finished(&mut self, id: TaskId, outcome: std::result::Result<(), String>) {
        let success = outcome.is_ok();
        let error = outcome.err();

        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
            task.status = if success {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            task.error = error.clone();
            info!(%id, task = %task.name, success, "task completed");
        } else {
            // Finished after a clear_completed sweep raced it; only the
            // event remains meaningful.
            warn!(%id, success, "completion for unknown task");
        }

        self.emit(TaskEvent::Completed { id, success, error });

        self.running = None;
        self.maybe_start_next();
    }

    /// The serialization point: the only place a worker is ever started.
    fn maybe_start_next(&mut self) {
        if self.running.is_some() {
            return;
        }

        let Some(task) = self
            .tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::Pending)
        else {
            return;
        };

        let Some(work) = task.work.take() else {
            // Pending without work should be impossible; fail it loudly
            // rather than wedging the queue.
            warn!(id = %task.id, "pending task had no work closure");
            task.status = TaskStatus::Failed;
            task.error = Some("task had no work closure".to_string());
            return;
        };

        let id = task.id;
        task.status = TaskStatus::Running;
        self.running = Some(id);

        info!(%id, task = %task.name, "task started");
        self.emit(TaskEvent::Started { id });

        let sink = ProgressSink {
            id,
            events: self.events.clone(),
        };
        let done_tx = self.done_tx.clone();

        // The body runs in its own tokio task; the supervisor awaits the
        // JoinHandle so a panicking body is converted into a failure
        // instead of taking the queue down.
        tokio::spawn(async move {
            let worker = tokio::spawn(work(sink));
            let outcome = match worker.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(format!("{err:#}")),
                Err(join_err) => Err(panic_message(join_err)),
            };
            let _ = done_tx.send((id, outcome)).await;
        });
    }

    fn emit(&self, event: TaskEvent) {
        // The subscriber may be gone during shutdown; events are best-effort.
        let _ = self.events.send(event);
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return "task was aborted".to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("task panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("task panicked: {msg}")
    } else {
        "task panicked".to_string()
    }
}
