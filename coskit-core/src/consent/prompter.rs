//! Consent prompter capability and the user-visible prompt text.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use super::ConsentChoice;
use crate::{Description, Origin};

/// Everything a prompter needs to render a consent prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// The requesting origin.
    pub origin: Origin,
    /// The requesting origin's own label for the file.
    pub description: Description,
    /// Whether an entry for the hash is already stored. Selects the template.
    pub exists_already: bool,
}

impl PromptRequest {
    /// The prompt message.
    ///
    /// An absent entry is phrased as a storage check, a present one as an
    /// access request.
    #[must_use]
    pub fn message(&self) -> String {
        if self.exists_already {
            format!(
                "{} wants to access the file \"{}\" stored by your browser.",
                self.origin, self.description
            )
        } else {
            format!(
                "{} wants to check if the file \"{}\" is stored by your browser.",
                self.origin, self.description
            )
        }
    }
}

/// Why a prompt produced no answer.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The prompt was closed without a choice, or its requester went away.
    #[error("prompt dismissed")]
    Dismissed,
    /// The prompter could not show the prompt.
    #[error("prompter unavailable: {0}")]
    Unavailable(String),
}

/// Shows a consent prompt and waits for the user's answer.
///
/// There is no timeout: the returned future stays pending until the user
/// answers. Dropping the future abandons the prompt.
#[async_trait]
pub trait ConsentPrompter: Send + Sync {
    /// Presents `request` with the three [`ConsentChoice`]s.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt is dismissed or cannot be shown. The
    /// broker treats both as a refusal that is not remembered.
    async fn prompt(&self, request: &PromptRequest) -> Result<ConsentChoice, PromptError>;
}

/// Prompter that always gives the same answer and counts how often it was
/// asked. Used for unattended hosts and tests.
#[derive(Debug)]
pub struct StaticPrompter {
    choice: ConsentChoice,
    prompts: AtomicUsize,
}

impl StaticPrompter {
    /// Creates a prompter answering `choice`.
    #[must_use]
    pub const fn new(choice: ConsentChoice) -> Self {
        Self {
            choice,
            prompts: AtomicUsize::new(0),
        }
    }

    /// Number of prompts shown so far.
    #[must_use]
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentPrompter for StaticPrompter {
    async fn prompt(&self, request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        log::debug!("auto-answering prompt for {}: {}", request.origin, self.choice);
        Ok(self.choice)
    }
}
