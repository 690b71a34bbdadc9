//! External speech and generation engine clients for the Parley platform.
//!
//! Every hard capability is delegated to OpenAI-compatible remote services
//! and accessed only through its request/response contract: transcription
//! (audio bytes → text), generation (ordered message list → reply text),
//! and speech synthesis (text → incremental audio byte stream). This crate
//! holds the thin clients for those contracts; conversation state and
//! stream cancellation live in the server crate.

pub mod chat;
pub mod error;
pub mod stt;
pub mod tts;

pub use chat::ChatClient;
pub use error::VoiceError;
pub use stt::SttClient;
pub use tts::{SpeechClient, SpeechStream};
