//! Parley server binary — the main entry point for the voice-assistant
//! backend.
//!
//! Starts an axum HTTP server with structured logging, external-service
//! clients built from config, and graceful shutdown on SIGTERM/SIGINT.

use parley_identity::TokenVerifier;
use parley_memory::MemoryClient;
use parley_server::playback::PlaybackRegistry;
use parley_server::session::SessionStore;
use parley_server::{app, config, AppState};
use parley_voice::{ChatClient, SpeechClient, SttClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Build external-service clients
    let stt = SttClient::new(
        &config.speech.base_url,
        &config.speech.api_key,
        &config.speech.stt_model,
    )
    .expect("failed to build transcription client");
    let chat = ChatClient::new(
        &config.speech.base_url,
        &config.speech.api_key,
        &config.speech.chat_model,
    )
    .expect("failed to build generation client");
    let speech = SpeechClient::new(
        &config.speech.base_url,
        &config.speech.api_key,
        &config.speech.tts_model,
        &config.speech.tts_voice,
    )
    .expect("failed to build speech synthesis client");
    let memory = MemoryClient::new(
        &config.memory.base_url,
        &config.memory.api_key,
        &config.memory.index,
        config.memory.dimension,
    )
    .expect("failed to build memory store client — check [memory] in config");
    let verifier = TokenVerifier::new(&config.identity.userinfo_url)
        .expect("failed to build identity verifier — set identity.userinfo_url in config");

    let audio_tmp_dir = config
        .server
        .audio_tmp_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&audio_tmp_dir)
        .expect("failed to create audio temp directory — check server.audio_tmp_dir in config");

    let state = AppState {
        sessions: SessionStore::new(&config.session.preamble, config.session.max_turns),
        playback: PlaybackRegistry::new(),
        stt: Arc::new(stt),
        chat: Arc::new(chat),
        speech: Arc::new(speech),
        memory: Arc::new(memory),
        memory_namespace: config.memory.namespace.clone(),
        verifier: Arc::new(verifier),
        audio_tmp_dir,
    };

    // Build application
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting parley server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("parley server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
