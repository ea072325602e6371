//! Shared types and constants for the Dialtone IVR service.
//!
//! This crate holds the plain data that crosses crate boundaries: transcript
//! turns, the per-call interaction mode, track records produced by the media
//! pipeline, and the reserved keypad codes the call flow reacts to.
//!
//! It has no runtime dependencies beyond `serde`, so both the media crate and
//! the server crate can depend on it without pulling in each other.

pub mod keys;
pub mod media;

pub use media::Track;

use serde::{Deserialize, Serialize};

/// Who said a line of the conversation transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The caller.
    User,
    /// The conversational AI backend.
    Assistant,
}

impl Role {
    /// Returns the role name used by chat-completion style APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One line of a call transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Which sub-flow interprets the next event of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    /// Freshly started or reset; the main menu is in charge.
    #[default]
    Idle,
    /// Spoken conversation with the AI backend.
    VoiceChat,
    /// Keypad (multi-tap) conversation with the AI backend.
    TextEntry,
    /// Music search and playback.
    Music,
}

impl CallMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::VoiceChat => "voice_chat",
            Self::TextEntry => "text_entry",
            Self::Music => "music",
        }
    }

    /// Whether this mode talks to the AI backend.
    pub fn is_chat(self) -> bool {
        matches!(self, Self::VoiceChat | Self::TextEntry)
    }
}
