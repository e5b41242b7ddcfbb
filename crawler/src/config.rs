//! Crawl run configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tbcrawl_core::CrawlMetadata;

/// How the next action is chosen on input screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    /// Deterministic heuristics only; no LLM budget needed.
    #[default]
    Assist,
    /// LLM-directed with heuristic fallback.
    Operator,
}

/// Everything one crawl run needs besides the transport and policy.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub metadata: CrawlMetadata,
    pub mode: DecisionMode,
    /// Consecutive identical `(node, action) -> result` observations before
    /// the action is permanently banned from that node.
    pub loop_repeat_threshold: u32,
    /// Consecutive identical overall screen signatures before the crawler
    /// treats the state as stuck and backtracks.
    pub same_signature_threshold: u32,
    /// Bounded retries per action on transient remote errors.
    pub max_step_retries: u32,
    /// Input-value candidates tried per input screen (branching bound).
    pub max_input_candidates: usize,
    /// Steps between checkpoint writes; 1 = after every step.
    pub checkpoint_interval: u64,
    pub response_timeout: Duration,
    /// Command that resets the target bot to its entry screen; re-sent when
    /// the crawler replays a path to navigate back to a node.
    pub start_command: String,
    /// Output directory for all artifacts.
    pub out_dir: PathBuf,
}

impl CrawlConfig {
    pub fn new(metadata: CrawlMetadata, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata,
            mode: DecisionMode::Assist,
            loop_repeat_threshold: 3,
            same_signature_threshold: 3,
            max_step_retries: 2,
            max_input_candidates: 3,
            checkpoint_interval: 1,
            response_timeout: Duration::from_secs(20),
            start_command: "/start".to_string(),
            out_dir: out_dir.into(),
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.out_dir.join("checkpoint.json")
    }

    pub fn bot_map_path(&self) -> PathBuf {
        self.out_dir.join("bot_map.json")
    }
}
