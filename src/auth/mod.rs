// src/auth/mod.rs

//! Credential broker: the sole long-lived holder of the privileged-session
//! secret.
//!
//! State machine: `Empty → Prompting → Cached → Empty` (on invalidation or
//! expiry), with `Cached → Prompting` when a caller forces a re-prompt after
//! a rejected credential.
//!
//! The cached secret lives behind one async mutex, and the mutex is held
//! across the interactive prompt. That gives the single-writer discipline
//! the rest of the system relies on: a validation failure on one attempt
//! can't race a concurrent acquire, and two overlapping operations can't
//! trigger two dialogs (the second caller observes the freshly cached
//! secret instead).
//!
//! Expiry is lazy: each `acquire`/`validate` checks the validity window
//! against an injectable [`Clock`]; there is no background timer.

pub mod clock;
pub mod prompt;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::errors::Result;
use crate::exec::Elevator;

pub use clock::{Clock, SystemClock};
pub use prompt::{
    spawn_prompt_actor, PromptBackend, PromptHandle, PromptRequest, TerminalPrompt,
};

/// How long a credential stays usable after its last successful validation
/// or prompt, unless refreshed.
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(5 * 60);

const PROMPT_FIRST: &str =
    "This action requires root privileges. Please enter your password";
const PROMPT_RETRY: &str = "Incorrect password. Please try again";

/// The cached secret plus its validity window.
struct CachedCredential {
    secret: Zeroizing<String>,
    valid_until: Instant,
    /// Set once a validation probe has accepted the secret.
    authenticated: bool,
}

/// Broker for the privileged-session secret.
///
/// Explicitly constructed and shared (`Arc`) rather than a process-wide
/// singleton, so ownership and test isolation stay clear.
pub struct CredentialBroker {
    prompt: PromptHandle,
    elevator: Arc<dyn Elevator>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Mutex<Option<CachedCredential>>,
}

impl fmt::Debug for CredentialBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose the cached secret, even through Debug.
        f.debug_struct("CredentialBroker")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialBroker {
    pub fn new(prompt: PromptHandle, elevator: Arc<dyn Elevator>, ttl: Duration) -> Self {
        Self::with_clock(prompt, elevator, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        prompt: PromptHandle,
        elevator: Arc<dyn Elevator>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prompt,
            elevator,
            clock,
            ttl,
            state: Mutex::new(None),
        }
    }

    /// Return a usable secret, prompting interactively if none is cached
    /// (or if `force_prompt` discards a previously rejected one).
    ///
    /// `Ok(None)` means the user declined. The returned copy is local to a
    /// single execution attempt; the broker remains the only long-lived
    /// holder.
    pub async fn acquire(&self, force_prompt: bool) -> Result<Option<Zeroizing<String>>> {
        let mut state = self.state.lock().await;
        self.expire_if_stale(&mut state);

        if !force_prompt {
            if let Some(cached) = state.as_ref() {
                debug!("reusing cached credential");
                return Ok(Some(cached.secret.clone()));
            }
        }

        // A forced re-prompt means the cached secret was rejected; drop it
        // before asking again.
        *state = None;

        let message = if force_prompt { PROMPT_RETRY } else { PROMPT_FIRST };
        match self.prompt.ask(message).await? {
            Some(secret) if !secret.is_empty() => {
                info!("credential cached after interactive prompt");
                *state = Some(CachedCredential {
                    secret: secret.clone(),
                    valid_until: self.clock.now() + self.ttl,
                    authenticated: false,
                });
                Ok(Some(secret))
            }
            _ => {
                debug!("interactive prompt declined");
                Ok(None)
            }
        }
    }

    /// Run the elevator's side-effect-free probe against the cached secret.
    ///
    /// Success refreshes the validity window; rejection or a probe timeout
    /// clears the secret entirely, so the next `acquire` must re-prompt.
    /// Returns `Ok(false)` when nothing is cached.
    pub async fn validate(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.expire_if_stale(&mut state);

        let Some(cached) = state.as_mut() else {
            return Ok(false);
        };

        match self.elevator.validate(&cached.secret).await {
            Ok(true) => {
                cached.authenticated = true;
                cached.valid_until = self.clock.now() + self.ttl;
                debug!("credential validated; validity window refreshed");
                Ok(true)
            }
            Ok(false) => {
                warn!("credential rejected by validation probe; clearing cache");
                *state = None;
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "validation probe failed; clearing cache");
                *state = None;
                Err(err)
            }
        }
    }

    /// Clear the cached secret immediately (explicit logout/cancel).
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            info!("credential cache cleared");
        }
    }

    /// Whether a (non-expired) credential is currently cached.
    pub async fn is_cached(&self) -> bool {
        let mut state = self.state.lock().await;
        self.expire_if_stale(&mut state);
        state.is_some()
    }

    /// Whether the cached credential has passed a validation probe.
    pub async fn is_authenticated(&self) -> bool {
        let mut state = self.state.lock().await;
        self.expire_if_stale(&mut state);
        state.as_ref().is_some_and(|c| c.authenticated)
    }

    fn expire_if_stale(&self, state: &mut Option<CachedCredential>) {
        if let Some(cached) = state.as_ref() {
            if self.clock.now() >= cached.valid_until {
                info!("credential cache expired");
                *state = None;
            }
        }
    }
}
