//! Session model: the chat transcript and name-capture state.

use serde::{Deserialize, Serialize};

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// A single transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }
}

/// Conversation state for one browsing session.
///
/// The transcript is append-only and its insertion order is the
/// conversation; `name_confirmed` flips to `true` exactly once and never
/// reverts. Both invariants are enforced here rather than trusted to
/// callers.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    transcript: Vec<Message>,
    user_name: Option<String>,
    name_confirmed: bool,
}

impl SessionState {
    /// Rebuild state from independently persisted parts.
    ///
    /// Used by the store on rehydration; a stored name with the confirmed
    /// flag unset is kept as-is (the flag is the source of truth).
    pub fn from_parts(
        transcript: Vec<Message>,
        user_name: Option<String>,
        name_confirmed: bool,
    ) -> Self {
        Self {
            transcript,
            user_name,
            name_confirmed,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn name_confirmed(&self) -> bool {
        self.name_confirmed
    }

    pub fn append(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Record the user's name and confirm it.
    ///
    /// Returns `false` (and changes nothing) if the name was already
    /// confirmed; the transition happens once per session.
    pub fn confirm_name(&mut self, name: impl Into<String>) -> bool {
        if self.name_confirmed {
            return false;
        }
        self.user_name = Some(name.into());
        self.name_confirmed = true;
        true
    }
}
