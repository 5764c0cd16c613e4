// src/auth/prompt.rs

//! Interactive prompt actor.
//!
//! A single tokio task owns the [`PromptBackend`] (the one interactive
//! surface in the process). Every caller, whatever task it runs on, sends a
//! [`PromptRequest`] over an mpsc channel and awaits the oneshot response.
//! This replaces same-thread-detection tricks: there is no special case for
//! "already on the interactive thread", so the rendezvous cannot deadlock.
//!
//! The actor never waits on its callers; it answers requests one at a time,
//! which also guarantees two overlapping operations can't stack dialogs.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use zeroize::Zeroizing;

use crate::errors::{PrivexecError, Result};

/// One secret request handed to the prompt actor.
pub struct PromptRequest {
    /// Human-readable reason shown to the user.
    pub message: String,
    /// Where the answer goes. `None` means the user declined.
    pub respond: oneshot::Sender<Option<Zeroizing<String>>>,
}

/// Trait abstracting the "ask the user for a secret" capability.
///
/// Production code uses [`TerminalPrompt`]; tests script answers instead of
/// touching a terminal. Returning `None` means the user declined.
pub trait PromptBackend: Send {
    fn ask(
        &mut self,
        message: String,
    ) -> Pin<Box<dyn Future<Output = Option<Zeroizing<String>>> + Send + '_>>;
}

/// Cloneable handle for submitting prompt requests to the actor.
#[derive(Debug, Clone)]
pub struct PromptHandle {
    tx: mpsc::Sender<PromptRequest>,
}

impl PromptHandle {
    /// Ask the user for a secret, blocking the calling task until the actor
    /// delivers an answer. `Ok(None)` means the user declined.
    pub async fn ask(&self, message: &str) -> Result<Option<Zeroizing<String>>> {
        let (respond, response) = oneshot::channel();
        self.tx
            .send(PromptRequest {
                message: message.to_string(),
                respond,
            })
            .await
            .map_err(|_| PrivexecError::PromptUnavailable)?;

        response.await.map_err(|_| PrivexecError::PromptUnavailable)
    }
}

/// Spawn the prompt actor that owns the interactive surface.
///
/// The actor exits once every [`PromptHandle`] clone has been dropped.
pub fn spawn_prompt_actor<B>(mut backend: B) -> PromptHandle
where
    B: PromptBackend + 'static,
{
    let (tx, mut rx) = mpsc::channel::<PromptRequest>(8);

    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let answer = backend.ask(request.message).await;
            // The requester may have given up waiting; that's fine.
            let _ = request.respond.send(answer);
        }
        debug!("prompt actor finished (all handles dropped)");
    });

    PromptHandle { tx }
}

/// Real prompt backend reading a password from the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl PromptBackend for TerminalPrompt {
    fn ask(
        &mut self,
        message: String,
    ) -> Pin<Box<dyn Future<Output = Option<Zeroizing<String>>> + Send + '_>> {
        Box::pin(async move {
            // rpassword blocks on terminal IO, so keep it off the runtime.
            let answer = tokio::task::spawn_blocking(move || {
                rpassword::prompt_password(format!("{message}: "))
            })
            .await;

            match answer {
                Ok(Ok(secret)) if !secret.is_empty() => Some(Zeroizing::new(secret)),
                // Empty input, EOF, or a terminal error all read as decline.
                _ => None,
            }
        })
    }
}
