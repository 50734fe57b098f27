//! Remote assistant abstraction.
//!
//! The widget talks to [`AssistantBackend`]; the production implementation
//! is [`GeminiClient`]. The two operations are always invoked in sequence:
//! speech is synthesized from the finalized reply text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod client;

pub use client::GeminiClient;

/// Reply generation failure.
///
/// Every kind is recovered locally by the widget (fallback message); none
/// of them is terminal for the session.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("no assistant API key is configured")]
    ConfigMissing,

    #[error("assistant request failed: {0}")]
    Network(String),

    #[error("assistant response was unusable: {0}")]
    Malformed(String),
}

/// Prebuilt synthesis voices offered in the widget settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoiceId {
    #[default]
    Kore,
    Zephyr,
    Puck,
    Charon,
    Fenrir,
}

impl VoiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceId::Kore => "Kore",
            VoiceId::Zephyr => "Zephyr",
            VoiceId::Puck => "Puck",
            VoiceId::Charon => "Charon",
            VoiceId::Fenrir => "Fenrir",
        }
    }

    /// Gender label shown next to the voice name in settings.
    pub fn gender(&self) -> &'static str {
        match self {
            VoiceId::Kore | VoiceId::Zephyr => "Female",
            VoiceId::Puck | VoiceId::Charon | VoiceId::Fenrir => "Male",
        }
    }

    pub fn all() -> &'static [VoiceId] {
        &[
            VoiceId::Kore,
            VoiceId::Zephyr,
            VoiceId::Puck,
            VoiceId::Charon,
            VoiceId::Fenrir,
        ]
    }

    /// Case-insensitive lookup by display name.
    pub fn parse(name: &str) -> Option<VoiceId> {
        VoiceId::all()
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote generation calls the widget depends on.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Generate the assistant's reply to a new utterance.
    ///
    /// The persona context carries the tone instructions and the knowledge
    /// base; a missing credential must be detected before any network I/O.
    async fn generate_reply(
        &self,
        persona_context: &str,
        utterance: &str,
    ) -> Result<String, ReplyError>;

    /// Synthesize speech for a finalized reply.
    ///
    /// Best-effort: returns a base64 PCM16/24kHz/mono payload, or `None`
    /// when no audio could be produced. Transport failures are swallowed
    /// here since the text has already been delivered.
    async fn synthesize_speech(&self, text: &str, voice: VoiceId) -> Option<String>;
}
