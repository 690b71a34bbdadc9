//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Conversation session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Speech/generation engine settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Long-term memory store settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Identity verification settings.
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory for scoped temporary audio artifacts. Defaults to the
    /// system temp directory.
    #[serde(default)]
    pub audio_tmp_dir: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "parley_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Conversation session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// The system preamble seeding every new transcript.
    #[serde(default = "default_preamble")]
    pub preamble: String,

    /// Transcript budget: oldest non-preamble turns are evicted past this.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

/// Speech and generation engine configuration (OpenAI-compatible).
#[derive(Clone, Deserialize)]
pub struct SpeechConfig {
    /// Base URL of the engine API (e.g. "https://api.openai.com/v1").
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,

    /// Bearer API key.
    #[serde(default)]
    pub api_key: String,

    /// Transcription model.
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Generation model.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Speech synthesis model.
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Speech synthesis voice.
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("stt_model", &self.stt_model)
            .field("chat_model", &self.chat_model)
            .field("tts_model", &self.tts_model)
            .field("tts_voice", &self.tts_voice)
            .finish()
    }
}

/// Long-term memory store configuration.
#[derive(Clone, Deserialize)]
pub struct MemoryConfig {
    /// Base URL of the vector index API.
    #[serde(default)]
    pub base_url: String,

    /// Store API key.
    #[serde(default)]
    pub api_key: String,

    /// Index name.
    #[serde(default = "default_memory_index")]
    pub index: String,

    /// Namespace holding conversation-summary records.
    #[serde(default = "default_memory_namespace")]
    pub namespace: String,

    /// Index vector dimension (used for the zero-vector listing query).
    #[serde(default = "default_memory_dimension")]
    pub dimension: usize,
}

impl fmt::Debug for MemoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("index", &self.index)
            .field("namespace", &self.namespace)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Identity verification configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// OIDC-style userinfo endpoint the bearer credential is checked
    /// against.
    #[serde(default)]
    pub userinfo_url: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_preamble() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_max_turns() -> usize {
    64
}

fn default_speech_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_tts_voice() -> String {
    "onyx".to_string()
}

fn default_memory_index() -> String {
    "parley".to_string()
}

fn default_memory_namespace() -> String {
    "user-memories".to_string()
}

fn default_memory_dimension() -> usize {
    1536
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            audio_tmp_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preamble: default_preamble(),
            max_turns: default_max_turns(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: default_speech_base_url(),
            api_key: String::new(),
            stt_model: default_stt_model(),
            chat_model: default_chat_model(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            index: default_memory_index(),
            namespace: default_memory_namespace(),
            dimension: default_memory_dimension(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PARLEY_HOST` overrides `server.host`
/// - `PARLEY_PORT` overrides `server.port`
/// - `PARLEY_LOG_LEVEL` overrides `logging.level`
/// - `PARLEY_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PARLEY_SPEECH_BASE_URL` overrides `speech.base_url`
/// - `PARLEY_SPEECH_API_KEY` overrides `speech.api_key`
/// - `PARLEY_MEMORY_BASE_URL` overrides `memory.base_url`
/// - `PARLEY_MEMORY_API_KEY` overrides `memory.api_key`
/// - `PARLEY_USERINFO_URL` overrides `identity.userinfo_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("PARLEY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("PARLEY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("PARLEY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("PARLEY_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(url) = std::env::var("PARLEY_SPEECH_BASE_URL") {
        config.speech.base_url = url;
    }
    if let Ok(key) = std::env::var("PARLEY_SPEECH_API_KEY") {
        config.speech.api_key = key;
    }
    if let Ok(url) = std::env::var("PARLEY_MEMORY_BASE_URL") {
        config.memory.base_url = url;
    }
    if let Ok(key) = std::env::var("PARLEY_MEMORY_API_KEY") {
        config.memory.api_key = key;
    }
    if let Ok(url) = std::env::var("PARLEY_USERINFO_URL") {
        config.identity.userinfo_url = url;
    }

    Ok(config)
}
