//! tbcrawl CLI: crawl a target bot's UI graph or resume an interrupted
//! crawl. Config from env and CLI args; artifacts land in the output
//! directory (`bot_map.json`, `golden.jsonl`, `backend_memory.jsonl`,
//! `checkpoint.json`).
//!
//! The live Telegram user-session transport is an external collaborator
//! implementing [`RemoteBotClient`](tbcrawl_telegram::RemoteBotClient); in
//! this tree the `--fixture` transport drives a scripted bot, which is what
//! dry runs and CI use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crawler::{CrawlConfig, Crawler, DecisionMode};
use llm_client::{EnvLlmConfig, OpenAiProvider};
use policy::{DecisionPolicy, OperatorPolicy};
use tbcrawl_core::init_tracing;
use tbcrawl_telegram::{FixtureClient, RemoteBotClient};

mod cli;

use cli::{build_config, Cli, Commands, ModeArg};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let (config, fixture, resuming) = match cli.command {
        Commands::Crawl {
            target,
            strategy,
            mode,
            max_depth,
            max_nodes,
            max_edges,
            max_actions,
            out,
            fixture,
        } => {
            let config = build_config(
                &target, strategy, mode, max_depth, max_nodes, max_edges, max_actions, out,
            )?;
            (config, fixture, false)
        }
        Commands::Resume { out, mode, fixture } => (resumed_config(out, mode)?, fixture, true),
    };

    init_tracing(&config.out_dir)?;
    let client = make_client(fixture.as_deref())?;
    let operator = make_operator(&config)?;
    let mut crawler = if resuming {
        Crawler::resume(config, client, operator)?
    } else {
        Crawler::new(config, client, operator)?
    };
    run(&mut crawler).await
}

async fn run(crawler: &mut Crawler) -> Result<()> {
    let cancel = crawler.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current step");
            cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });

    let summary = crawler.run().await?;
    println!(
        "Crawl finished ({}): {} nodes, {} edges, {} actions",
        summary.reason, summary.nodes, summary.edges, summary.actions_taken
    );
    Ok(())
}

/// Chooses the remote transport. Only the fixture transport is in-tree; a
/// live session client plugs in through the same trait.
fn make_client(fixture: Option<&Path>) -> Result<Arc<dyn RemoteBotClient>> {
    let path = fixture.context(
        "no transport configured: pass --fixture <script.json> (live session \
         transports implement RemoteBotClient externally)",
    )?;
    let client = FixtureClient::from_file(path)
        .with_context(|| format!("load fixture script {}", path.display()))?;
    Ok(Arc::new(client))
}

/// Operator mode wires the OpenAI-compatible provider from env; assist mode
/// never constructs one.
fn make_operator(config: &CrawlConfig) -> Result<Option<Arc<dyn DecisionPolicy>>> {
    if config.mode != DecisionMode::Operator {
        return Ok(None);
    }
    let llm = EnvLlmConfig::from_env().context("operator mode needs LLM config")?;
    let provider = Arc::new(OpenAiProvider::from_config(&llm).context("build LLM client")?);
    Ok(Some(Arc::new(OperatorPolicy::new(provider))))
}

/// Config for resume: budgets and strategy come from the checkpointed bot
/// map's metadata so the resumed run stays consistent with the original.
fn resumed_config(out: PathBuf, mode: ModeArg) -> Result<CrawlConfig> {
    let map_path = out.join("bot_map.json");
    let raw = std::fs::read_to_string(&map_path)
        .with_context(|| format!("read {} (needed to resume)", map_path.display()))?;
    let map: tbcrawl_core::BotMap = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", map_path.display()))?;

    let mut config = CrawlConfig::new(map.metadata, out);
    config.mode = match mode {
        ModeArg::Assist => DecisionMode::Assist,
        ModeArg::Operator => DecisionMode::Operator,
    };
    Ok(config)
}
