//! Long-term memory records.
//!
//! A `MemoryRecord` is a durably stored, embeddable text summary tagged
//! with owner and provenance. Records are written once at conversation
//! finalize time and never mutated; the external store computes the
//! embedding from the `text` field itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category tag applied to conversation-summary memories.
pub const CATEGORY_CONVERSATION_SUMMARY: &str = "conversation-summary";

/// A write-once long-term memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record id.
    pub id: String,
    /// The summary content. The store embeds this field for similarity search.
    pub text: String,
    /// The caller identity that owns this memory.
    pub owner: String,
    /// The session the memory originated from.
    pub session: String,
    /// UTC creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Category tag (e.g. [`CATEGORY_CONVERSATION_SUMMARY`]).
    pub category: String,
}

impl MemoryRecord {
    /// Builds a conversation-summary record with a fresh id and the current
    /// UTC timestamp.
    pub fn conversation_summary(
        text: impl Into<String>,
        owner: impl Into<String>,
        session: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            owner: owner.into(),
            session: session.into(),
            created_at: Utc::now(),
            category: CATEGORY_CONVERSATION_SUMMARY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_summary_fills_provenance() {
        let record = MemoryRecord::conversation_summary("likes rust", "user-1", "sess-1");
        assert_eq!(record.owner, "user-1");
        assert_eq!(record.session, "sess-1");
        assert_eq!(record.category, CATEGORY_CONVERSATION_SUMMARY);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let a = MemoryRecord::conversation_summary("a", "o", "s");
        let b = MemoryRecord::conversation_summary("b", "o", "s");
        assert_ne!(a.id, b.id);
    }
}
