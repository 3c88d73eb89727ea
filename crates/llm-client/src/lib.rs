//! Chat model client for the book recommendation service.
//!
//! This crate sends a conversation to an OpenAI-compatible chat
//! completions endpoint and returns the reply text. It handles:
//! - Building the request body from domain [`Turn`]s
//! - Bearer authentication with a key read from the environment
//! - Extracting `choices[0].message.content` from the response
//!
//! Calls are made exactly once; callers decide what a failure means.

use std::time::Duration;

use async_trait::async_trait;
use domain::Turn;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// Default chat completions path.
pub const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";

/// Default model name.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default environment variable holding the API key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Errors that can occur when calling the chat model
#[derive(Error, Debug)]
pub enum LlmClientError {
    #[error("API key not set (expected environment variable {0})")]
    MissingApiKey(String),

    #[error("Chat request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from chat endpoint: {0}")]
    InvalidResponse(String),
}

/// Something that can continue a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the name of this model client (for logging/debugging)
    fn name(&self) -> &str;

    /// Send `turns` in order and return the reply text.
    async fn complete(&self, turns: &[Turn]) -> Result<String, LlmClientError>;
}

/// Connection settings for [`OpenAiChatClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatClientConfig {
    pub api_base: String,
    pub path: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    pub api_key: String,
}

impl ChatClientConfig {
    /// Default settings with the key taken from `api_key_env`.
    pub fn from_env(api_key_env: &str) -> Result<Self, LlmClientError> {
        Ok(Self::with_api_key(read_api_key(api_key_env)?))
    }

    /// Default settings with an explicit key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            path: DEFAULT_CHAT_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(30),
            api_key: api_key.into(),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), self.path)
    }
}

/// Read a non-empty API key from the environment.
pub fn read_api_key(var: &str) -> Result<String, LlmClientError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(LlmClientError::MissingApiKey(var.to_string())),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [Turn],
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http_client: reqwest::Client,
    config: ChatClientConfig,
    url: String,
}

impl OpenAiChatClient {
    /// Build a client.
    ///
    /// # Arguments
    /// * `config` - Endpoint, model and key; `config.timeout` bounds the
    ///   whole request
    pub fn new(config: ChatClientConfig) -> Result<Self, LlmClientError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmClientError::MissingApiKey("api_key".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let url = config.url();

        Ok(Self {
            http_client,
            config,
            url,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    fn name(&self) -> &str {
        "OpenAiChatClient"
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String, LlmClientError> {
        debug!(
            "Sending {} turns to {} (model: {})",
            turns.len(),
            self.url,
            self.config.model
        );
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: turns,
        };

        let response = self
            .http_client
            .post(&self.url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Chat request to {} failed: {}", self.url, e);
                LlmClientError::Request(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat endpoint returned {}", status);
            return Err(LlmClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| LlmClientError::InvalidResponse(e.to_string()))?;
        reply_content(&json)
    }
}

/// Extract `choices[0].message.content` from a completion body.
pub fn reply_content(json: &Value) -> Result<String, LlmClientError> {
    json.get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            LlmClientError::InvalidResponse("missing choices[0].message.content".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_content_from_first_choice() {
        let json = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "{\"books\": []}" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(reply_content(&json).unwrap(), "{\"books\": []}");
    }

    #[test]
    fn test_reply_content_missing() {
        for json in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"message": {}}]}),
            json!({"choices": [{"message": {"content": null}}]}),
        ] {
            assert!(matches!(
                reply_content(&json),
                Err(LlmClientError::InvalidResponse(_))
            ));
        }
    }

    #[test]
    fn test_request_body_shape() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello")];
        let body = ChatRequest {
            model: "gpt-4o",
            temperature: 0.5,
            messages: &turns,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "temperature": 0.5,
                "messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            })
        );
    }

    #[test]
    fn test_default_config_and_url() {
        let config = ChatClientConfig::with_api_key("sk-test");
        assert_eq!(config.url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout, Duration::from_secs(30));

        let config = ChatClientConfig {
            api_base: "http://localhost:8080/".to_string(),
            ..config
        };
        assert_eq!(config.url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_missing_api_key() {
        let err = read_api_key("SHELF_RECS_TEST_KEY_THAT_IS_NEVER_SET").unwrap_err();
        assert!(matches!(err, LlmClientError::MissingApiKey(var) if var.contains("NEVER_SET")));

        let err = OpenAiChatClient::new(ChatClientConfig::with_api_key("  ")).unwrap_err();
        assert!(matches!(err, LlmClientError::MissingApiKey(_)));
    }
}
