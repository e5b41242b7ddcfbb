//! LLM configuration loaded from environment variables.

use anyhow::{Context, Result};
use std::env;

/// OpenAI-compatible provider config from env.
#[derive(Debug, Clone)]
pub struct EnvLlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl EnvLlmConfig {
    /// Load from environment variables. OPENAI_API_KEY is required;
    /// OPENAI_BASE_URL, MODEL and LLM_TIMEOUT_SECS have defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = env::var("MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let request_timeout_secs = env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        Ok(Self {
            api_key,
            base_url,
            model,
            request_timeout_secs,
        })
    }
}
