//! Parley server library logic.
//!
//! The orchestration layer of the platform: sequences the external
//! transcription, generation, speech, memory, and identity services into
//! the turn-taking and finalize-to-memory flows, over in-process session
//! state and per-session playback cancellation.

pub mod api;
pub mod api_audio;
pub mod api_memory;
pub mod api_session;
pub mod config;
pub mod middleware;
pub mod playback;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use playback::PlaybackRegistry;
use serde_json::{json, Value};
use session::SessionStore;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use parley_identity::TokenVerifier;
use parley_memory::MemoryClient;
use parley_voice::{ChatClient, SpeechClient, SttClient};

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// payloads on non-audio routes.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Maximum audio upload size (25 MiB), matching the transcription engine's
/// own input cap.
const MAX_AUDIO_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Memory snippets retrieved per query, on both retrieval paths.
pub(crate) const MEMORY_TOP_K: usize = 5;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Conversation session repository.
    pub sessions: SessionStore,
    /// Per-session playback cancellation registry.
    pub playback: PlaybackRegistry,
    /// Transcription client.
    pub stt: Arc<SttClient>,
    /// Generation client.
    pub chat: Arc<ChatClient>,
    /// Speech synthesis client.
    pub speech: Arc<SpeechClient>,
    /// Long-term memory store client.
    pub memory: Arc<MemoryClient>,
    /// Namespace holding conversation-summary records.
    pub memory_namespace: String,
    /// Bearer credential verifier.
    pub verifier: Arc<TokenVerifier>,
    /// Directory for scoped temporary audio artifacts.
    pub audio_tmp_dir: PathBuf,
}

/// Liveness handler for `GET /hello`.
async fn hello() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    // Audio uploads need a larger body limit than everything else.
    let audio_routes = Router::new()
        .route("/process_audio", post(api_audio::process_audio_handler))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    let protected_routes = Router::new()
        .route(
            "/finalize_conversation",
            post(api_memory::finalize_conversation_handler),
        )
        .route(
            "/retrieve_memories",
            get(api_memory::retrieve_memories_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/hello", get(hello))
        .route("/new_session", get(api_session::new_session_handler))
        .route("/stop_playing", post(api_session::stop_playing_handler))
        .merge(audio_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
