use crate::error::VoiceError;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Maximum text input size for synthesis (64 KiB). Prevents resource
/// exhaustion from oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Connect timeout for the synthesis endpoint. No overall timeout is set:
/// the response body is an open-ended stream consumed at playback pace.
const TTS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

/// Client for an OpenAI-compatible speech endpoint
/// (`POST {base}/audio/speech`), producing audio incrementally.
#[derive(Clone)]
pub struct SpeechClient {
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

impl SpeechClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(TTS_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            voice: voice.into(),
            client,
        })
    }

    /// Opens an incremental speech stream for `text`.
    ///
    /// The returned stream is lazy, finite, and not restartable: chunks
    /// arrive as the synthesis engine produces them, and dropping the
    /// stream releases the underlying connection.
    pub async fn stream(&self, text: &str) -> Result<SpeechStream, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                voice: &self.voice,
                input: text,
            })
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "speech API error {}: {}",
                status, body
            )));
        }

        let inner = res
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| VoiceError::Tts(e.to_string())));
        Ok(SpeechStream {
            inner: Box::pin(inner),
        })
    }
}

/// A lazy, finite sequence of synthesized audio chunks.
pub struct SpeechStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, VoiceError>> + Send>>,
}

impl std::fmt::Debug for SpeechStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechStream").finish_non_exhaustive()
    }
}

impl Stream for SpeechStream {
    type Item = Result<Bytes, VoiceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
