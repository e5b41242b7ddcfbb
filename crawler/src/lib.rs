//! # crawler
//!
//! The exploration engine: drives a remote bot through
//! [`RemoteBotClient`](tbcrawl_telegram::RemoteBotClient), deduplicates
//! screens by signature, bans looping actions, checkpoints progress after
//! every completed step, and emits the durable artifacts (`bot_map.json`,
//! `golden.jsonl`, `backend_memory.jsonl`, `checkpoint.json`).

pub mod checkpoint;
pub mod config;
pub mod crawl;
pub mod frontier;
pub mod state;
pub mod trace;

pub use config::{CrawlConfig, DecisionMode};
pub use crawl::{CrawlSummary, Crawler, TerminationReason};
pub use frontier::Frontier;
pub use state::CrawlState;
