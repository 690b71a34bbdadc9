//! Session lifecycle and playback-control handlers.

use crate::AppState;
use axum::extract::{Extension, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
}

/// Handler for `GET /new_session`.
///
/// Allocates a fresh session seeded with the system preamble. Sessions can
/// also come into existence lazily when `process_audio` sees an unseen id;
/// explicit creation here always wins over lazy initialization.
pub async fn new_session_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<NewSessionResponse> {
    let session_id = state.sessions.create();
    tracing::debug!(%session_id, "created session");
    Json(NewSessionResponse { session_id })
}

#[derive(Debug, Deserialize)]
pub struct StopPlayingParams {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopPlayingResponse {
    pub stopped: bool,
}

/// Handler for `POST /stop_playing`.
///
/// Cancels the session's current playback stream, if any. Only the
/// targeted session is affected.
pub async fn stop_playing_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<StopPlayingParams>,
) -> Json<StopPlayingResponse> {
    let stopped = state.playback.stop(&params.session_id);
    tracing::debug!(session_id = %params.session_id, stopped, "playback stop requested");
    Json(StopPlayingResponse { stopped })
}
