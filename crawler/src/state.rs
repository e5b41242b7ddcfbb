//! Mutable crawl bookkeeping behind the dedup/ban invariants.
//!
//! [`CrawlState`] wraps the serializable [`CrawlCheckpoint`] shape with the
//! decision logic that mutates it: attempt counting, loop detection, the
//! permanent action-ban set, and the same-signature stuck guard. The
//! checkpoint is the exact persisted twin; converting to and from it is
//! lossless, so a resumed crawl reproduces identical decisions.

use tracing::{debug, info};

use tbcrawl_core::CrawlCheckpoint;

/// Outcome of recording an executed action's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopVerdict {
    /// Nothing suspicious.
    Ok,
    /// Same result repeated but still under the threshold.
    Repeating(u32),
    /// Threshold crossed; the action is now permanently banned on this node.
    Banned,
}

/// Exclusively owned by one crawler instance for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    inner: CrawlCheckpoint,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_checkpoint(checkpoint: CrawlCheckpoint) -> Self {
        Self { inner: checkpoint }
    }

    /// Snapshot for persistence. `queue` is filled in by the caller since the
    /// frontier lives outside this struct.
    pub fn to_checkpoint(&self, queue: Vec<tbcrawl_core::FrontierEntry>) -> CrawlCheckpoint {
        let mut cp = self.inner.clone();
        cp.queue = queue;
        cp
    }

    /// Queue entries captured at checkpoint time (drained on resume).
    pub fn take_queue(&mut self) -> Vec<tbcrawl_core::FrontierEntry> {
        std::mem::take(&mut self.inner.queue)
    }

    pub fn is_visited(&self, node_id: &str) -> bool {
        self.inner.visited_signatures.contains(node_id)
    }

    /// Marks a node fully expanded.
    pub fn mark_visited(&mut self, node_id: &str) {
        self.inner.visited_signatures.insert(node_id.to_string());
    }

    pub fn visited_count(&self) -> usize {
        self.inner.visited_signatures.len()
    }

    pub fn is_banned(&self, node_id: &str, action_key: &str) -> bool {
        self.inner
            .action_bans
            .get(node_id)
            .is_some_and(|bans| bans.contains(action_key))
    }

    /// Number of executions attempted for `(node, action)`, failures included.
    pub fn attempts(&self, node_id: &str, action_key: &str) -> u32 {
        self.inner
            .action_attempts
            .get(node_id)
            .and_then(|m| m.get(action_key))
            .copied()
            .unwrap_or(0)
    }

    pub fn record_attempt(&mut self, node_id: &str, action_key: &str) {
        *self
            .inner
            .action_attempts
            .entry(node_id.to_string())
            .or_default()
            .entry(action_key.to_string())
            .or_insert(0) += 1;
    }

    /// Records that executing `action_key` from `node_id` produced
    /// `result_node`. When the same pair keeps producing the same result
    /// `threshold` consecutive times, the action is permanently banned from
    /// that node (self-loops on confirmation dialogs, no-op toggles).
    pub fn record_action_result(
        &mut self,
        node_id: &str,
        action_key: &str,
        result_node: &str,
        threshold: u32,
    ) -> LoopVerdict {
        let last = self
            .inner
            .action_last_result
            .entry(node_id.to_string())
            .or_default();
        let repeats = self
            .inner
            .action_repeat_counts
            .entry(node_id.to_string())
            .or_default();

        let count = match last.get(action_key) {
            Some(prev) if prev == result_node => {
                let c = repeats.entry(action_key.to_string()).or_insert(0);
                *c += 1;
                *c
            }
            _ => {
                last.insert(action_key.to_string(), result_node.to_string());
                repeats.insert(action_key.to_string(), 1);
                1
            }
        };

        if count >= threshold {
            info!(node = node_id, action = action_key, "action banned after {} identical results", count);
            self.inner
                .action_bans
                .entry(node_id.to_string())
                .or_default()
                .insert(action_key.to_string());
            LoopVerdict::Banned
        } else if count > 1 {
            debug!(node = node_id, action = action_key, count, "repeating result");
            LoopVerdict::Repeating(count)
        } else {
            LoopVerdict::Ok
        }
    }

    /// Updates the consecutive-identical-signature counter and returns the
    /// new count. Resets to 1 when the signature changes.
    pub fn observe_signature(&mut self, signature: &str) -> u32 {
        if self.inner.last_signature.as_deref() == Some(signature) {
            self.inner.same_signature_repeat += 1;
        } else {
            self.inner.last_signature = Some(signature.to_string());
            self.inner.same_signature_repeat = 1;
        }
        self.inner.same_signature_repeat
    }

    pub fn reset_signature_guard(&mut self) {
        self.inner.last_signature = None;
        self.inner.same_signature_repeat = 0;
    }

    pub fn actions_taken(&self) -> u64 {
        self.inner.actions_taken
    }

    pub fn count_action(&mut self) {
        self.inner.actions_taken += 1;
    }

    /// Path from the start screen to the node currently being expanded.
    pub fn set_current_path(&mut self, path: Vec<tbcrawl_core::Action>) {
        self.inner.current_path = path;
    }

    /// Drops the last step of the current path (stuck-state backtrack).
    pub fn backtrack_current_path(&mut self) {
        self.inner.current_path.pop();
    }

    /// Records progress inside the current node's action list so resume
    /// continues at the same offset.
    pub fn record_step_position(&mut self, action_key: &str, next_index: usize) {
        self.inner.last_actions.push(action_key.to_string());
        self.inner.last_start_action_index = next_index;
    }

    /// Where to continue inside the current node's action list.
    pub fn start_action_index(&self) -> usize {
        self.inner.last_start_action_index
    }

    /// Called when expansion of a node begins: clears per-node progress.
    pub fn begin_node(&mut self) {
        self.inner.last_actions.clear();
        self.inner.last_start_action_index = 0;
    }
}
