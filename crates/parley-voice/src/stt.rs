use crate::error::VoiceError;
use std::path::Path;
use std::time::Duration;

/// Maximum audio input size for transcription (25 MiB), matching the common
/// upstream cap. Prevents OOM from oversized payloads.
const MAX_STT_INPUT_BYTES: usize = 25 * 1024 * 1024;

/// Timeout for a transcription round trip.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for an OpenAI-compatible transcription endpoint
/// (`POST {base}/audio/transcriptions`).
#[derive(Clone)]
pub struct SttClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl SttClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(STT_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Transcribes the audio file at `path`.
    ///
    /// `format_hint` is the original upload's file extension; it only
    /// shapes the multipart filename and MIME type, the engine detects the
    /// actual codec itself. Failures are terminal; there is no retry.
    pub async fn transcribe_file(
        &self,
        path: &Path,
        format_hint: &str,
    ) -> Result<String, VoiceError> {
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| VoiceError::Stt(format!("failed to read audio file: {}", e)))?;

        if audio.is_empty() {
            return Err(VoiceError::Stt("audio file is empty".to_string()));
        }
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let ext = if format_hint.is_empty() { "wav" } else { format_hint };
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(format!("audio.{}", ext))
            .mime_str(mime_for_extension(ext))
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription API error {}: {}",
                status, body
            )));
        }

        let json: serde_json::Value = res.json().await.map_err(|e| VoiceError::Stt(e.to_string()))?;
        let text = json
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(text)
    }
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}
