use crate::error::VoiceError;
use parley_types::Turn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for a generation round trip.
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

// OpenAI-compatible request/response shapes.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireReply,
}

#[derive(Deserialize)]
struct WireReply {
    content: String,
}

/// Client for an OpenAI-compatible chat endpoint
/// (`POST {base}/chat/completions`).
#[derive(Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Generates a reply from the full ordered transcript.
    pub async fn complete(&self, turns: &[Turn]) -> Result<String, VoiceError> {
        let request = ChatRequest {
            model: &self.model,
            messages: turns
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VoiceError::Chat(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Chat(format!(
                "generation API error {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = res.json().await.map_err(|e| VoiceError::Chat(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| VoiceError::Chat("generation API returned no choices".to_string()))
    }

    /// One-shot ask with a system framing and a single user message.
    /// Used for the finalize-time summary and retention judgment.
    pub async fn ask(&self, framing: &str, input: &str) -> Result<String, VoiceError> {
        let turns = [Turn::system(framing), Turn::user(input)];
        self.complete(&turns).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::Role;

    #[test]
    fn request_carries_transcript_order() {
        let turns = vec![
            Turn::system("preamble"),
            Turn::user("hi"),
            Turn::assistant("hello"),
        ];
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: turns
                .iter()
                .map(|t| WireMessage {
                    role: t.role.as_str(),
                    content: &t.content,
                })
                .collect(),
        };
        let json = serde_json::to_value(&request).unwrap();
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["content"], "hello");
        assert_eq!(turns[1].role, Role::User);
    }
}
