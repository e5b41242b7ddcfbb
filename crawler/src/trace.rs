//! Append-only step traces and the bot map artifact.
//!
//! Two JSONL logs grow during a crawl: the golden trace (state-in, action,
//! state-out; a regression fixture for the replay engine) and the backend
//! memory trace (richer per-step analysis for debugging). Both are append
//! operations only, so a crash mid-crawl leaves a valid, truncated but
//! parseable log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};

use tbcrawl_core::{normalize_action_text, Action, BotMap, Node, Result};

/// State snapshot recorded on both sides of a golden-trace step.
pub fn state_snapshot(node: &Node) -> Value {
    json!({
        "node_id": node.id,
        "screen_type": node.screen_type,
        "text": node.text,
        "has_media": node.media.has_media,
    })
}

/// Open appenders for the two JSONL traces in `dir`.
pub struct TraceWriter {
    golden: File,
    backend: File,
    step: u64,
}

impl TraceWriter {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let open = |name: &str| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(name))
        };
        Ok(Self {
            golden: open("golden.jsonl")?,
            backend: open("backend_memory.jsonl")?,
            step: 0,
        })
    }

    /// Resumes step numbering after a checkpoint reload.
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Appends one executed step to both traces.
    pub fn append_step(
        &mut self,
        state_in: Value,
        action: &Action,
        state_out: Value,
        screen_label: &str,
    ) -> Result<()> {
        self.step += 1;
        let golden_line = json!({
            "step": self.step,
            "state_in": state_in,
            "user_action": {
                "key": action.key(),
                "action": action,
            },
            "state_out": state_out,
        });
        writeln!(self.golden, "{}", golden_line)?;

        // Normalized label so decorated and plain variants of the same
        // button compare equal across trace lines.
        let action_label = match action {
            Action::Click { button } => normalize_action_text(&button.text),
            Action::SendText { value } => normalize_action_text(value),
        };
        let backend_line = json!({
            "step": self.step,
            "analysis": {
                "screen_label": screen_label,
                "action_label": action_label,
                "action_described": action.describe(),
            },
        });
        writeln!(self.backend, "{}", backend_line)?;
        Ok(())
    }
}

/// Writes the bot map artifact. Called at completion and on checkpoint
/// intervals; a partial map is a legitimate output.
pub fn write_bot_map(path: impl AsRef<Path>, map: &BotMap) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(map)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Screen label inferred for the backend trace: first non-empty line,
/// truncated.
pub fn infer_screen_label(text: &str) -> String {
    const MAX: usize = 60;
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let trimmed = line.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{}…", cut)
    }
}
