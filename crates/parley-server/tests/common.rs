//! Shared test support: a fake upstream cluster standing in for the
//! transcription, generation, speech, memory, and identity services, plus
//! helpers to spawn a parley server wired against it.
#![allow(dead_code)]

use axum::body::Body;
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use parley_identity::TokenVerifier;
use parley_memory::MemoryClient;
use parley_server::playback::PlaybackRegistry;
use parley_server::session::SessionStore;
use parley_server::{app, AppState};
use parley_voice::{ChatClient, SpeechClient, SttClient};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The bearer token the fake identity service accepts.
pub const TEST_BEARER: &str = "test-token";

/// The owner subject the fake identity service hands out.
pub const TEST_OWNER: &str = "user-1";

/// Recorded state of the fake upstream cluster.
pub struct Upstream {
    /// Text the fake transcription endpoint returns.
    pub transcript: Mutex<String>,
    /// Replies the fake chat endpoint returns, front first.
    pub chat_replies: Mutex<VecDeque<String>>,
    /// Hits the fake similarity search endpoint returns.
    pub search_hits: Mutex<Vec<String>>,
    /// Hits the fake filtered vector query endpoint returns.
    pub list_hits: Mutex<Vec<String>>,
    /// Records upserted into the fake memory store.
    pub upserts: Mutex<Vec<Value>>,
    /// Whether the transcription endpoint should fail with a 500.
    pub fail_stt: AtomicBool,
    /// Number of chunks the fake synthesis endpoint streams.
    pub speech_chunks: AtomicUsize,
    /// Delay between streamed synthesis chunks.
    pub speech_chunk_delay_ms: AtomicU64,
}

impl Upstream {
    pub fn new() -> Self {
        Self {
            transcript: Mutex::new("hello there".to_string()),
            chat_replies: Mutex::new(VecDeque::new()),
            search_hits: Mutex::new(Vec::new()),
            list_hits: Mutex::new(Vec::new()),
            upserts: Mutex::new(Vec::new()),
            fail_stt: AtomicBool::new(false),
            speech_chunks: AtomicUsize::new(4),
            speech_chunk_delay_ms: AtomicU64::new(0),
        }
    }

    pub fn push_chat_reply(&self, reply: &str) {
        self.chat_replies
            .lock()
            .unwrap()
            .push_back(reply.to_string());
    }

    pub fn set_search_hits(&self, hits: &[&str]) {
        *self.search_hits.lock().unwrap() = hits.iter().map(|s| s.to_string()).collect();
    }

    pub fn set_list_hits(&self, hits: &[&str]) {
        *self.list_hits.lock().unwrap() = hits.iter().map(|s| s.to_string()).collect();
    }

    pub fn upserted(&self) -> Vec<Value> {
        self.upserts.lock().unwrap().clone()
    }
}

async fn stt_handler(State(upstream): State<Arc<Upstream>>) -> Response {
    if upstream.fail_stt.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "engine exploded").into_response();
    }
    let text = upstream.transcript.lock().unwrap().clone();
    Json(json!({ "text": text })).into_response()
}

async fn chat_handler(State(upstream): State<Arc<Upstream>>) -> Json<Value> {
    let reply = upstream
        .chat_replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| "Understood.".to_string());
    Json(json!({
        "choices": [ { "message": { "content": reply } } ]
    }))
}

async fn speech_handler(State(upstream): State<Arc<Upstream>>) -> Response {
    let chunks = upstream.speech_chunks.load(Ordering::SeqCst);
    let delay = Duration::from_millis(upstream.speech_chunk_delay_ms.load(Ordering::SeqCst));
    let stream = futures_util::stream::iter(0..chunks).then(move |i| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok::<Bytes, Infallible>(Bytes::from(vec![i as u8; 32]))
    });
    Body::from_stream(stream).into_response()
}

async fn upsert_handler(
    State(upstream): State<Arc<Upstream>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    upstream.upserts.lock().unwrap().push(body);
    Json(json!({ "upserted": 1 }))
}

async fn search_handler(State(upstream): State<Arc<Upstream>>) -> Json<Value> {
    let matches: Vec<Value> = upstream
        .search_hits
        .lock()
        .unwrap()
        .iter()
        .map(|text| json!({ "fields": { "text": text } }))
        .collect();
    Json(json!({ "matches": matches }))
}

async fn query_handler(State(upstream): State<Arc<Upstream>>) -> Json<Value> {
    let matches: Vec<Value> = upstream
        .list_hits
        .lock()
        .unwrap()
        .iter()
        .map(|text| json!({ "metadata": { "text": text } }))
        .collect();
    Json(json!({ "matches": matches }))
}

async fn userinfo_handler(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {}", TEST_BEARER));
    if authorized {
        Json(json!({ "sub": TEST_OWNER })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "invalid token").into_response()
    }
}

async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let router = Router::new()
        .route("/audio/transcriptions", post(stt_handler))
        .route("/chat/completions", post(chat_handler))
        .route("/audio/speech", post(speech_handler))
        .route(
            "/indexes/{index}/namespaces/{ns}/records",
            post(upsert_handler),
        )
        .route(
            "/indexes/{index}/namespaces/{ns}/search",
            post(search_handler),
        )
        .route("/indexes/{index}/query", post(query_handler))
        .route("/userinfo", get(userinfo_handler))
        .with_state(upstream);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A running parley server wired against the fake upstream cluster.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub upstream: Arc<Upstream>,
    /// Keeps the scoped audio temp directory alive for inspection.
    pub tmp_dir: tempfile::TempDir,
}

pub async fn spawn_server() -> TestServer {
    let upstream = Arc::new(Upstream::new());
    let upstream_base = spawn_upstream(upstream.clone()).await;
    let tmp_dir = tempfile::tempdir().unwrap();

    let state = AppState {
        sessions: SessionStore::new("You are a helpful assistant.", 64),
        playback: PlaybackRegistry::new(),
        stt: Arc::new(SttClient::new(&upstream_base, "test-key", "whisper-1").unwrap()),
        chat: Arc::new(ChatClient::new(&upstream_base, "test-key", "gpt-3.5-turbo").unwrap()),
        speech: Arc::new(SpeechClient::new(&upstream_base, "test-key", "tts-1", "onyx").unwrap()),
        memory: Arc::new(MemoryClient::new(&upstream_base, "test-key", "parley", 8).unwrap()),
        memory_namespace: "user-memories".to_string(),
        verifier: Arc::new(TokenVerifier::new(format!("{}/userinfo", upstream_base)).unwrap()),
        audio_tmp_dir: tmp_dir.path().to_path_buf(),
    };

    let app = app(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        state,
        upstream,
        tmp_dir,
    }
}

pub fn audio_form() -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(vec![1u8, 2, 3, 4])
        .file_name("utterance.wav")
        .mime_str("audio/wav")
        .unwrap();
    reqwest::multipart::Form::new().part("file", part)
}

pub async fn process_audio(server: &TestServer, session_id: &str, tts: bool) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!(
            "{}/process_audio?session_id={}&tts={}",
            server.base_url, session_id, tts
        ))
        .bearer_auth(TEST_BEARER)
        .multipart(audio_form())
        .send()
        .await
        .unwrap()
}

/// Number of files currently in the scoped audio temp directory.
pub fn temp_audio_files(server: &TestServer) -> usize {
    std::fs::read_dir(server.tmp_dir.path()).unwrap().count()
}
