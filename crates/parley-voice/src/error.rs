use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("transcription error: {0}")]
    Stt(String),

    #[error("generation error: {0}")]
    Chat(String),

    #[error("speech synthesis error: {0}")]
    Tts(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
