//! The turn-taking flow: one uploaded utterance in, one assistant reply
//! out, optionally as streamed synthesized speech.

use crate::api::ApiError;
use crate::middleware::CallerContext;
use crate::playback::CancellableAudio;
use crate::{AppState, MEMORY_TOP_K};
use axum::body::Body;
use axum::extract::{Extension, Multipart, Query};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use parley_types::Turn;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ProcessAudioParams {
    pub session_id: String,
    #[serde(default)]
    pub tts: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessAudioResponse {
    pub transcribed_text: String,
    pub assistant_text: String,
}

/// Handler for `POST /process_audio?tts={bool}&session_id={id}`.
///
/// Transcribes the uploaded audio, folds relevant long-term memories into
/// the session transcript, generates a reply, and returns either the text
/// pair or a cancellable synthesized-speech stream.
pub async fn process_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(CallerContext(identity)): Extension<CallerContext>,
    Query(params): Query<ProcessAudioParams>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {}", e)))?
        .ok_or_else(|| ApiError::BadRequest("no audio file provided".to_string()))?;

    let format_hint = field
        .file_name()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "wav".to_string());

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {}", e)))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("empty audio upload".to_string()));
    }

    // Scoped temp artifact: the TempPath guard removes the file on every
    // exit path out of this handler.
    let temp_audio = tempfile::Builder::new()
        .prefix("parley-audio-")
        .suffix(&format!(".{}", format_hint))
        .tempfile_in(&state.audio_tmp_dir)
        .map_err(|e| ApiError::Internal(format!("failed to create temp file: {}", e)))?
        .into_temp_path();
    tokio::fs::write(&temp_audio, &data)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to persist upload: {}", e)))?;

    // Fresh playback token for this utterance. A previous token for the
    // same session is superseded, not retroactively armed.
    let playback = state.playback.begin(&params.session_id);

    let transcribed = state
        .stt
        .transcribe_file(&temp_audio, &format_hint)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    state.sessions.get_or_init(&params.session_id);

    // Best-effort memory retrieval: failures and empty results degrade
    // silently, never fatally.
    match state
        .memory
        .search_text(
            &state.memory_namespace,
            &identity.subject,
            &transcribed,
            MEMORY_TOP_K,
        )
        .await
    {
        Ok(snippets) if !snippets.is_empty() => {
            state.sessions.append(
                &params.session_id,
                Turn::system(format!(
                    "Relevant long-term memories:\n{}",
                    snippets.join("\n")
                )),
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(session_id = %params.session_id, "memory retrieval failed: {}", e);
        }
    }

    state
        .sessions
        .append(&params.session_id, Turn::user(transcribed.clone()));

    let context = state
        .sessions
        .snapshot(&params.session_id)
        .ok_or_else(|| ApiError::Internal("session disappeared mid-request".to_string()))?;

    let reply = state
        .chat
        .complete(&context)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    state
        .sessions
        .append(&params.session_id, Turn::assistant(reply.clone()));

    tracing::info!(
        session_id = %params.session_id,
        owner = %identity.subject,
        tts = params.tts,
        "utterance processed"
    );

    if !params.tts {
        return Ok(Json(ProcessAudioResponse {
            transcribed_text: transcribed,
            assistant_text: reply,
        })
        .into_response());
    }

    let speech = state
        .speech
        .stream(&reply)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    let audio = CancellableAudio::new(speech, playback);

    Ok((
        [(header::CONTENT_TYPE, "audio/mpeg")],
        Body::from_stream(audio),
    )
        .into_response())
}
