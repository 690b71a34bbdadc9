//! Finalize-to-memory and memory listing handlers.

use crate::api::ApiError;
use crate::middleware::CallerContext;
use crate::{AppState, MEMORY_TOP_K};
use axum::extract::{Extension, Query};
use axum::Json;
use parley_types::{MemoryRecord, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SUMMARY_FRAMING: &str = "Summarize the following conversation. \
    Focus on key insights and useful context worth remembering about the user.";

const JUDGE_FRAMING: &str = "You decide whether a conversation summary is worth \
    retaining as long-term memory. Answer only \"yes\" or \"no\".";

#[derive(Debug, Deserialize)]
pub struct FinalizeParams {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub message: String,
}

/// Renders a transcript to role-prefixed lines in original order.
fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First token of the judgment reply, matched case-insensitively for the
/// substring "yes". Anything else, including an empty reply, is a no.
fn is_affirmative(reply: &str) -> bool {
    reply
        .split_whitespace()
        .next()
        .is_some_and(|token| token.to_ascii_lowercase().contains("yes"))
}

/// Handler for `POST /finalize_conversation?session_id={id}`.
///
/// Summarizes the transcript, asks the generation engine whether the
/// summary is worth retaining, and on a yes stores it as a long-term
/// memory and destroys the session. A rejected summary leaves the session
/// in place; only an accepted finalize is destructive.
pub async fn finalize_conversation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(identity)): Extension<CallerContext>,
    Query(params): Query<FinalizeParams>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let transcript = state
        .sessions
        .snapshot(&params.session_id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown session: {}", params.session_id)))?;

    let blob = render_transcript(&transcript);
    let summary = state
        .chat
        .ask(SUMMARY_FRAMING, &blob)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let verdict = state
        .chat
        .ask(
            JUDGE_FRAMING,
            &format!(
                "Is this summary worth retaining as long-term memory?\n\n{}",
                summary
            ),
        )
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    if !is_affirmative(&verdict) {
        tracing::info!(
            session_id = %params.session_id,
            "summary judged not useful, session retained"
        );
        return Ok(Json(FinalizeResponse {
            message: "Conversation summary judged not useful; nothing stored.".to_string(),
        }));
    }

    let record = MemoryRecord::conversation_summary(
        summary,
        identity.subject.as_str(),
        params.session_id.as_str(),
    );
    state
        .memory
        .upsert(&state.memory_namespace, &record)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    state.sessions.finalize_and_remove(&params.session_id);

    tracing::info!(
        session_id = %params.session_id,
        memory_id = %record.id,
        owner = %identity.subject,
        "conversation finalized to long-term memory"
    );
    Ok(Json(FinalizeResponse {
        message: "Conversation summarized and stored to long-term memory.".to_string(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RetrieveMemoriesResponse {
    pub memories: Vec<String>,
}

/// Handler for `GET /retrieve_memories`.
///
/// Lists the caller's stored memories via the filter-only query path (no
/// similarity ranking), returning the text of each record.
pub async fn retrieve_memories_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(identity)): Extension<CallerContext>,
) -> Result<Json<RetrieveMemoriesResponse>, ApiError> {
    let memories = state
        .memory
        .list_by_owner(&state.memory_namespace, &identity.subject, MEMORY_TOP_K)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(RetrieveMemoriesResponse { memories }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_matches_first_token_case_insensitively() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("Yes, definitely."));
        assert!(is_affirmative("YES!"));
        assert!(is_affirmative("\"Yes\" it is"));
    }

    #[test]
    fn non_affirmative_replies_are_rejected() {
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("Not really"));
        assert!(!is_affirmative("Maybe yes")); // only the first token counts
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("   "));
    }

    #[test]
    fn transcript_renders_role_prefixed_lines_in_order() {
        let turns = vec![
            Turn::system("preamble"),
            Turn::user("hi"),
            Turn::assistant("hello"),
        ];
        assert_eq!(
            render_transcript(&turns),
            "system: preamble\nuser: hi\nassistant: hello"
        );
    }
}
