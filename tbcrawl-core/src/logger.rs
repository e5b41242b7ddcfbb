//! Tracing setup for crawl runs.
//!
//! Each run logs to stdout and to `crawl.log` inside its output directory,
//! next to `bot_map.json` and the step traces, so a finished run keeps its
//! own log. The level filter comes from RUST_LOG (default `info`); load .env
//! before calling this or RUST_LOG from the file is not seen.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global subscriber. Fails if one is already set.
pub fn init_tracing(out_dir: impl AsRef<Path>) -> anyhow::Result<()> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(out_dir.join("crawl.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout.and(Arc::new(log_file)))
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set global subscriber: {}", e))?;
    Ok(())
}
