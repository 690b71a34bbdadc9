//! Shared types for the Parley voice-assistant platform.
//!
//! This crate provides the foundational conversation and memory types used
//! across all Parley crates. No crate in the workspace depends on anything
//! *except* `parley-types` for cross-cutting type definitions, which keeps
//! the dependency graph clean and prevents circular dependencies.

use serde::{Deserialize, Serialize};

pub mod memory;

pub use memory::MemoryRecord;

/// Speaker role of a conversation turn.
///
/// The role names match the wire format of OpenAI-compatible chat APIs, so
/// a transcript can be sent to the generation engine without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and injected context (preamble, retrieved memories).
    System,
    /// The caller's transcribed speech.
    User,
    /// The generation engine's reply.
    Assistant,
}

impl Role {
    /// Returns the wire-format string label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in a conversation transcript.
///
/// Transcript ordering is append-only and significant: the ordered turn
/// sequence is the context sent to the generation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
