//! # Decision policy
//!
//! Given the current screen snapshot, proposes the next action. Two
//! interchangeable strategies behind [`DecisionPolicy`]:
//!
//! - [`HeuristicPolicy`] (assist/offline mode): deterministic pattern
//!   matching against an ordered rule table; keeps exploration replay-stable
//!   with no LLM budget.
//! - [`OperatorPolicy`] (operator mode): serializes the snapshot to JSON,
//!   asks an injected [`LlmProvider`](llm_client::LlmProvider) for a strict
//!   JSON decision, and parses defensively. A 429 from the provider becomes a
//!   [`Decision::BackoffSleep`], never an immediate retry and never fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tbcrawl_core::{Button, ScreenType};

pub mod heuristic;
pub mod operator;

pub use heuristic::{classify_screen, input_candidates, HeuristicPolicy};
pub use operator::OperatorPolicy;

/// Next-action decision, as produced by a policy. The wire shape (JSON with
/// an `action_type` tag) is what the operator-mode LLM is asked to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Decision {
    ClickInline { row: usize, col: usize },
    ClickReply { row: usize, col: usize },
    SendText { value: String },
    /// Provider is rate limited; pause this long before re-attempting the
    /// node. The crawler decides whether to sleep or fall back to heuristics.
    BackoffSleep { seconds: u64 },
    /// Nothing left worth doing on this screen.
    Stop,
}

/// Policy failures. All recoverable for the crawl: the caller falls back to
/// the heuristic path for the step instead of aborting.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Provider error: {0}")]
    Provider(#[from] llm_client::LlmError),

    #[error("Undecodable decision: {0}")]
    Decode(String),
}

/// What a policy sees: the current screen plus a crawl-state summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UiSnapshot {
    pub screen_text: String,
    pub screen_type: ScreenType,
    /// Flattened buttons with kind/row/col/payload, as the extractor produced
    /// them.
    pub buttons: Vec<Button>,
    pub input_required: bool,
    /// Crawl-state summary for the LLM: how much is explored, recent health.
    pub visited_nodes: usize,
    pub actions_taken: u64,
    pub recent_failures: u32,
}

/// Strategy interface. Implementations must be side-effect free with respect
/// to crawl state; the crawler owns all bookkeeping.
#[async_trait::async_trait]
pub trait DecisionPolicy: Send + Sync {
    async fn decide(&self, snapshot: &UiSnapshot) -> Result<Decision, PolicyError>;
}
