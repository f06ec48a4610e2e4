//! # Inference Backend Client
//!
//! HTTP client for the external ML chat backend. Failure modes the worker
//! must tell apart (timeout, unreachable, bad status, malformed body) are
//! explicit variants; all of them end up as a failed worker result, never a
//! panic or a crash of the consumption loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Request timed out")]
    Timeout,

    #[error("Service unavailable: {0}")]
    Unreachable(String),

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Unreachable(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// One turn of a chat conversation on the backend's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// Successful chat reply.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub model: String,
}

/// Client for the chat-completion endpoint of the inference backend.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    default_model: String,
}

impl InferenceClient {
    pub fn new(
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("prediction-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            default_model: default_model.into(),
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Build the ordered turn list: well-formed history entries followed by
    /// the new user turn. Entries without a string `role` and `content` are
    /// skipped (the validators reject them before this point on the worker
    /// path).
    pub fn build_messages(message: &str, history: &[serde_json::Value]) -> Vec<ChatTurn> {
        let mut turns: Vec<ChatTurn> = history
            .iter()
            .filter_map(|entry| {
                let role = entry.get("role")?.as_str()?;
                let content = entry.get("content")?.as_str()?;
                Some(ChatTurn {
                    role: role.to_string(),
                    content: content.to_string(),
                })
            })
            .collect();

        turns.push(ChatTurn {
            role: "user".to_string(),
            content: message.to_string(),
        });

        turns
    }

    /// Send a chat request and return the assistant's reply text.
    pub async fn chat(
        &self,
        model_id: &str,
        message: &str,
        history: &[serde_json::Value],
    ) -> Result<ChatReply, InferenceError> {
        let model = if model_id.is_empty() {
            self.default_model.as_str()
        } else {
            model_id
        };
        let messages = Self::build_messages(message, history);

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&serde_json::json!({
                "model": model,
                "messages": messages,
                "stream": false,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), "Inference backend returned error status");
            return Err(InferenceError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        let content = body
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                InferenceError::MalformedResponse("missing message.content".to_string())
            })?;

        Ok(ChatReply {
            content: content.to_string(),
            model: model.to_string(),
        })
    }

    /// Probe the backend. Never errors; an unreachable backend is `false`.
    pub async fn health_check(&self) -> bool {
        let probe = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await;

        matches!(probe, Ok(response) if response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_appends_user_turn() {
        let history = vec![
            serde_json::json!({"role": "user", "content": "hi"}),
            serde_json::json!({"role": "assistant", "content": "hello"}),
        ];

        let turns = InferenceClient::build_messages("how are you?", &history);

        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[2].role, "user");
        assert_eq!(turns[2].content, "how are you?");
    }

    #[test]
    fn test_build_messages_skips_malformed_entries() {
        let history = vec![
            serde_json::json!({"role": "user"}),
            serde_json::json!("not an object"),
            serde_json::json!({"role": "assistant", "content": "kept"}),
        ];

        let turns = InferenceClient::build_messages("question", &history);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "kept");
        assert_eq!(turns[1].content, "question");
    }

    #[tokio::test]
    async fn test_unreachable_backend_maps_to_unreachable() {
        // Nothing listens on this port.
        let client = InferenceClient::new("http://127.0.0.1:1", "llama3", 2).unwrap();
        let result = client.chat("llama3", "hello", &[]).await;

        match result {
            Err(InferenceError::Unreachable(_)) | Err(InferenceError::Timeout) => {}
            other => panic!("expected connection failure, got {other:?}"),
        }

        assert!(!client.health_check().await);
    }
}
