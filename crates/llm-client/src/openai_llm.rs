//! OpenAI-compatible implementation of [`LlmProvider`] over reqwest.
//!
//! Talks to `{base_url}/chat/completions` with bearer auth. Non-2xx
//! responses become [`LlmError`] carrying the real HTTP status, which is what
//! lets the decision policy recognize 429 without string matching.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::EnvLlmConfig;
use crate::extract::first_json_object;
use crate::{LlmError, LlmProvider};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Reqwest-based OpenAI-compatible chat-completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, "https://api.openai.com/v1".to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, LlmError> {
        Self::build(api_key, base_url, Duration::from_secs(60))
    }

    pub fn from_config(config: &EnvLlmConfig) -> Result<Self, LlmError> {
        Ok(Self::build(
            config.api_key.clone(),
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_model(config.model.clone()))
    }

    fn build(api_key: String, base_url: String, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::parse(format!("http client init: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: "gpt-4o-mini".to_string(),
        })
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    #[instrument(skip(self, system_prompt, user_payload))]
    async fn generate_json(
        &self,
        system_prompt: &str,
        user_payload: &Value,
    ) -> Result<Value, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_payload.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::new(format!("request failed: {}", e), e.status().map(|s| s.as_u16())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "LLM provider returned non-success");
            return Err(LlmError::new(
                format!("provider error: {}", truncate(&body, 300)),
                Some(status.as_u16()),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::parse(format!("malformed completion response: {}", e)))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::parse("empty completion"))?;

        debug!(content_len = content.len(), "LLM completion received");
        first_json_object(&content)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
