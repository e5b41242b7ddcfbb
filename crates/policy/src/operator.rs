//! LLM-directed policy (operator mode).
//!
//! Serializes the UI snapshot into a strict-JSON decision request against an
//! injected [`LlmProvider`]. Rate limiting (429) is turned into a
//! [`Decision::BackoffSleep`] without retrying; every other provider or parse
//! failure propagates as a typed error so the crawler can fall back to the
//! heuristic path for that step.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use llm_client::LlmProvider;

use crate::{Decision, DecisionPolicy, PolicyError, UiSnapshot};

/// System prompt describing the exact decision schema.
const SYSTEM_PROMPT: &str = r#"You are driving exploration of a Telegram bot's UI.
Given the current screen (text, buttons with row/col coordinates, whether free-text input is expected) and a crawl summary, choose the single next action.
Respond with ONLY one JSON object, no prose, in one of these forms:
{"action_type":"click_inline","row":0,"col":1}
{"action_type":"click_reply","row":0,"col":0}
{"action_type":"send_text","value":"example"}
{"action_type":"stop"}
Prefer buttons that lead to unexplored screens; when input is required, send a plausible short value."#;

/// Default pause suggested when the provider is rate limited.
const DEFAULT_BACKOFF_SECS: u64 = 30;

/// Operator-mode policy with an injected provider (never a singleton, so
/// tests can substitute a mock).
pub struct OperatorPolicy {
    provider: Arc<dyn LlmProvider>,
    backoff_seconds: u64,
}

impl OperatorPolicy {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            backoff_seconds: DEFAULT_BACKOFF_SECS,
        }
    }

    pub fn with_backoff_seconds(mut self, seconds: u64) -> Self {
        self.backoff_seconds = seconds;
        self
    }
}

#[async_trait::async_trait]
impl DecisionPolicy for OperatorPolicy {
    async fn decide(&self, snapshot: &UiSnapshot) -> Result<Decision, PolicyError> {
        let payload = serde_json::to_value(snapshot)
            .map_err(|e| PolicyError::Decode(format!("snapshot serialization: {}", e)))?;

        let result = self.provider.generate_json(SYSTEM_PROMPT, &payload).await;

        let value = match result {
            Ok(value) => value,
            Err(e) if e.is_rate_limited() => {
                // No immediate retry of the same request; the crawler decides
                // whether to sleep or switch to heuristics.
                warn!(seconds = self.backoff_seconds, "provider rate limited, backing off");
                return Ok(Decision::BackoffSleep {
                    seconds: self.backoff_seconds,
                });
            }
            Err(e) => return Err(PolicyError::Provider(e)),
        };

        let decision: Decision = serde_json::from_value(value.clone()).map_err(|e| {
            PolicyError::Decode(format!("decision does not match schema: {} ({})", e, value))
        })?;
        debug!(?decision, "operator decision");
        Ok(decision)
    }
}

/// Builds the crawl-summary half of the snapshot payload; exposed so the
/// crawler can log exactly what the LLM saw.
pub fn snapshot_summary(snapshot: &UiSnapshot) -> serde_json::Value {
    json!({
        "visited_nodes": snapshot.visited_nodes,
        "actions_taken": snapshot.actions_taken,
        "recent_failures": snapshot.recent_failures,
        "input_required": snapshot.input_required,
        "button_count": snapshot.buttons.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_client::LlmError;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock provider returning a fixed result and counting calls.
    struct MockProvider {
        result: Result<Value, LlmError>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(result: Result<Value, LlmError>) -> Self {
            Self {
                result,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for MockProvider {
        async fn generate_json(
            &self,
            _system_prompt: &str,
            _user_payload: &Value,
        ) -> Result<Value, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn snapshot() -> UiSnapshot {
        UiSnapshot {
            screen_text: "Введите сумму:".to_string(),
            input_required: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rate_limited_yields_backoff_without_retry() {
        let provider = Arc::new(MockProvider::new(Err(LlmError::new("too many requests", Some(429)))));
        let policy = OperatorPolicy::new(provider.clone()).with_backoff_seconds(7);

        let decision = policy.decide(&snapshot()).await.unwrap();
        assert_eq!(decision, Decision::BackoffSleep { seconds: 7 });
        // One call only: no immediate same-request retry.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_provider_error_propagates() {
        let provider = Arc::new(MockProvider::new(Err(LlmError::new("boom", Some(500)))));
        let policy = OperatorPolicy::new(provider);

        let err = policy.decide(&snapshot()).await.unwrap_err();
        match err {
            PolicyError::Provider(e) => assert_eq!(e.status_code, Some(500)),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_valid_decision_parses() {
        let provider = Arc::new(MockProvider::new(Ok(serde_json::json!(
            {"action_type":"send_text","value":"10"}
        ))));
        let policy = OperatorPolicy::new(provider);

        let decision = policy.decide(&snapshot()).await.unwrap();
        assert_eq!(
            decision,
            Decision::SendText {
                value: "10".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_decode_error() {
        let provider = Arc::new(MockProvider::new(Ok(serde_json::json!(
            {"action":"unknown"}
        ))));
        let policy = OperatorPolicy::new(provider);

        let err = policy.decide(&snapshot()).await.unwrap_err();
        assert!(matches!(err, PolicyError::Decode(_)));
    }
}
