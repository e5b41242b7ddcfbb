//! Frontier queue: discovered-but-not-expanded nodes in strategy order.

use std::collections::VecDeque;

use tbcrawl_core::{FrontierEntry, Strategy};

/// BFS appends to the tail, DFS pushes to the head; expansion always pops
/// from the head.
#[derive(Debug, Clone)]
pub struct Frontier {
    entries: VecDeque<FrontierEntry>,
    strategy: Strategy,
}

impl Frontier {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            entries: VecDeque::new(),
            strategy,
        }
    }

    /// Rebuilds the frontier from checkpointed queue order.
    pub fn from_entries(strategy: Strategy, entries: Vec<FrontierEntry>) -> Self {
        Self {
            entries: entries.into(),
            strategy,
        }
    }

    pub fn push(&mut self, entry: FrontierEntry) {
        match self.strategy {
            Strategy::Bfs => self.entries.push_back(entry),
            Strategy::Dfs => self.entries.push_front(entry),
        }
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.entries.pop_front()
    }

    /// Re-queues an entry at the head so it is expanded next regardless of
    /// strategy (used when resuming a node after a backoff pause).
    pub fn push_front(&mut self, entry: FrontierEntry) {
        self.entries.push_front(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue contents in order, for checkpointing.
    pub fn to_entries(&self) -> Vec<FrontierEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> FrontierEntry {
        FrontierEntry {
            node_id: id.to_string(),
            path: vec![],
            depth: 0,
        }
    }

    #[test]
    fn test_bfs_pops_in_insertion_order() {
        let mut f = Frontier::new(Strategy::Bfs);
        f.push(entry("a"));
        f.push(entry("b"));
        assert_eq!(f.pop().unwrap().node_id, "a");
        assert_eq!(f.pop().unwrap().node_id, "b");
    }

    #[test]
    fn test_dfs_pops_most_recent_first() {
        let mut f = Frontier::new(Strategy::Dfs);
        f.push(entry("a"));
        f.push(entry("b"));
        assert_eq!(f.pop().unwrap().node_id, "b");
        assert_eq!(f.pop().unwrap().node_id, "a");
    }

    #[test]
    fn test_roundtrip_preserves_queue_order() {
        let mut f = Frontier::new(Strategy::Bfs);
        f.push(entry("a"));
        f.push(entry("b"));
        let rebuilt = Frontier::from_entries(Strategy::Bfs, f.to_entries());
        let ids: Vec<String> = rebuilt.to_entries().into_iter().map(|e| e.node_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
