//! # LLM provider abstraction
//!
//! Defines the [`LlmProvider`] trait (one method: `generate_json`) and an
//! OpenAI-compatible implementation over reqwest. Provider errors are typed
//! ([`LlmError`]) and carry the HTTP status code so callers can distinguish
//! rate limiting (429) from everything else; the decision policy turns 429
//! into a backoff decision instead of retrying.
//!
//! The provider is always injected into its consumer's constructor, never a
//! module-level singleton, so it can be swapped or mocked in tests.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod config;
pub mod extract;
mod openai_llm;

pub use config::EnvLlmConfig;
pub use extract::first_json_object;
pub use openai_llm::OpenAiProvider;

/// Typed provider error: message plus the HTTP-like status code when one
/// exists (network failures and parse failures have none).
#[derive(Error, Debug, Clone)]
#[error("LLM error{}: {message}", .status_code.map(|c| format!(" (status {})", c)).unwrap_or_default())]
pub struct LlmError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl LlmError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    /// Error without a status code (transport or parse failure).
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(message, None)
    }

    /// True when the provider reported HTTP 429. The caller must not retry
    /// the same request immediately.
    pub fn is_rate_limited(&self) -> bool {
        self.status_code == Some(429)
    }
}

/// External completion provider: one strict-JSON decision request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends `system_prompt` + the serialized `user_payload` and returns the
    /// first JSON object found in the completion, parsed. The raw completion
    /// may wrap the object in fenced code blocks or prose; implementations
    /// extract defensively (see [`extract::first_json_object`]).
    async fn generate_json(
        &self,
        system_prompt: &str,
        user_payload: &Value,
    ) -> Result<Value, LlmError>;
}
