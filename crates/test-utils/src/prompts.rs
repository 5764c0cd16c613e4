//! Scripted prompt backend for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use privexec::auth::PromptBackend;
use zeroize::Zeroizing;

/// A prompt backend that:
/// - records every message it was asked with
/// - answers from a fixed script (`None` = user declined)
/// - declines once the script is exhausted.
pub struct ScriptedPrompt {
    answers: VecDeque<Option<String>>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl ScriptedPrompt {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            answers: answers.into_iter().collect(),
            messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script that types each given answer in order.
    pub fn answering(answers: &[&str]) -> Self {
        Self::new(answers.iter().map(|s| Some(s.to_string())))
    }

    /// Script that declines the first prompt.
    pub fn declining() -> Self {
        Self::new([None])
    }

    /// Shared handle to the recorded prompt messages.
    pub fn messages(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.messages)
    }
}

impl PromptBackend for ScriptedPrompt {
    fn ask(
        &mut self,
        message: String,
    ) -> Pin<Box<dyn Future<Output = Option<Zeroizing<String>>> + Send + '_>> {
        self.messages.lock().unwrap().push(message);
        let answer = self
            .answers
            .pop_front()
            .flatten()
            .map(Zeroizing::new);
        Box::pin(async move { answer })
    }
}
