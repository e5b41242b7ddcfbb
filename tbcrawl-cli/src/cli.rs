//! CLI parser and crawl-config assembly.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crawler::{CrawlConfig, DecisionMode};
use tbcrawl_core::{CrawlMetadata, Strategy};

#[derive(Parser)]
#[command(name = "tbcrawl")]
#[command(about = "Bot state-space crawler: explore a Telegram bot's UI graph", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    Bfs,
    Dfs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Deterministic heuristics, no LLM.
    Assist,
    /// LLM-directed with heuristic fallback (needs OPENAI_API_KEY).
    Operator,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl a target bot and emit bot_map.json plus step traces.
    Crawl {
        /// Target bot identifier (e.g. @some_bot).
        #[arg(short, long)]
        target: String,
        #[arg(long, value_enum, default_value_t = StrategyArg::Bfs)]
        strategy: StrategyArg,
        #[arg(long, value_enum, default_value_t = ModeArg::Assist)]
        mode: ModeArg,
        #[arg(long, default_value_t = 5)]
        max_depth: u32,
        #[arg(long, default_value_t = 100)]
        max_nodes: usize,
        #[arg(long, default_value_t = 400)]
        max_edges: usize,
        #[arg(long, default_value_t = 500)]
        max_actions: u64,
        /// Output directory for all artifacts.
        #[arg(short, long, default_value = "./crawl-out")]
        out: PathBuf,
        /// Drive a scripted fixture bot instead of a live session (dry run).
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
    /// Resume an interrupted crawl from its checkpoint.
    Resume {
        #[arg(short, long, default_value = "./crawl-out")]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = ModeArg::Assist)]
        mode: ModeArg,
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
}

/// Builds the crawl config from CLI flags.
pub fn build_config(
    target: &str,
    strategy: StrategyArg,
    mode: ModeArg,
    max_depth: u32,
    max_nodes: usize,
    max_edges: usize,
    max_actions: u64,
    out: PathBuf,
) -> Result<CrawlConfig> {
    let mut metadata = CrawlMetadata::new(target);
    metadata.strategy = match strategy {
        StrategyArg::Bfs => Strategy::Bfs,
        StrategyArg::Dfs => Strategy::Dfs,
    };
    metadata.max_depth = max_depth;
    metadata.max_nodes = max_nodes;
    metadata.max_edges = max_edges;
    metadata.max_actions = max_actions;

    let mut config = CrawlConfig::new(metadata, out);
    config.mode = match mode {
        ModeArg::Assist => DecisionMode::Assist,
        ModeArg::Operator => DecisionMode::Operator,
    };
    Ok(config)
}
