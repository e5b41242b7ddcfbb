//! Checkpoint store: serialize/deserialize crawl progress so a crawl can be
//! killed and resumed without repeating work or losing dedup/ban state.
//!
//! `load` returns `Ok(None)` when no checkpoint file exists, so a fresh crawl
//! and a resumed crawl share the same startup path. A malformed file is a
//! loud error: silently resuming from empty state would forget bans and
//! reintroduce the very loops that were already proven unproductive.

use std::path::Path;

use tracing::info;

use tbcrawl_core::{CrawlCheckpoint, CrawlError, Result};

/// Overwrites the checkpoint at `path`. Advisory, not transactional: a crash
/// mid-write is tolerated because the reader fails loudly on malformed data.
pub fn save(path: impl AsRef<Path>, checkpoint: &CrawlCheckpoint) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(checkpoint)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Loads the checkpoint at `path`. Absent file means fresh crawl (`None`);
/// anything unparseable is an error, never an empty resume.
pub fn load(path: impl AsRef<Path>) -> Result<Option<CrawlCheckpoint>> {
    let path = path.as_ref();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let checkpoint: CrawlCheckpoint = serde_json::from_str(&raw).map_err(|e| {
        CrawlError::Checkpoint(format!(
            "corrupt checkpoint at {}: {} (refusing to resume from empty state)",
            path.display(),
            e
        ))
    })?;
    info!(
        visited = checkpoint.visited_signatures.len(),
        queued = checkpoint.queue.len(),
        "checkpoint loaded"
    );
    Ok(Some(checkpoint))
}
