//! Graph model for a discovered bot: nodes (screens), buttons, actions,
//! edges (transitions), the aggregate [`BotMap`], and the resumable
//! [`CrawlCheckpoint`] shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of a clickable element on a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Inline,
    Reply,
    Url,
}

impl std::fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ButtonKind::Inline => write!(f, "inline"),
            ButtonKind::Reply => write!(f, "reply"),
            ButtonKind::Url => write!(f, "url"),
        }
    }
}

/// One clickable element with its position in the screen layout.
///
/// Two buttons are the same *action* only if `(kind, row, col, data-or-url)`
/// all match. Text alone is not sufficient: two buttons can share a label at
/// different positions with different effects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub kind: ButtonKind,
    pub row: usize,
    pub col: usize,
    /// Opaque callback payload for inline buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Button {
    /// Stable identity key for this button as an action:
    /// `kind:row:col:payload` where payload is data, url, or `-`.
    pub fn action_key(&self) -> String {
        let payload = self
            .data
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or("-");
        format!("{}:{}:{}:{}", self.kind, self.row, self.col, payload)
    }
}

/// A single interaction that may transition between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Click a specific button (identified by kind/position/payload).
    Click { button: Button },
    /// Send a text value (command or input-prompt answer).
    SendText { value: String },
}

impl Action {
    /// Stable dedup key. For clicks this is the button identity key; for text
    /// it is the literal value. Used for edge dedup, bans, and attempt counts.
    pub fn key(&self) -> String {
        match self {
            Action::Click { button } => button.action_key(),
            Action::SendText { value } => format!("text:{}", value),
        }
    }

    /// Short human-readable form for logs and trace labels.
    pub fn describe(&self) -> String {
        match self {
            Action::Click { button } => format!("click [{}]", button.text),
            Action::SendText { value } => format!("send \"{}\"", value),
        }
    }
}

/// Classification of a discovered screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenType {
    /// Presents buttons to choose from.
    Menu,
    /// Expects a free-text answer.
    InputRequired,
    /// No further interaction offered.
    #[default]
    Terminal,
}

/// Media attached to a screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub has_media: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_types: Vec<String>,
}

/// A discovered screen. Created once per unique signature the first time the
/// crawler observes it; `example_path` is the action sequence that reached it
/// first (first-seen path wins, never replaced).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable id derived from the screen signature.
    pub id: String,
    pub text: String,
    /// Ordered rows of buttons as laid out on the screen.
    pub buttons: Vec<Vec<Button>>,
    pub screen_type: ScreenType,
    #[serde(default)]
    pub media: MediaInfo,
    pub example_path: Vec<Action>,
    pub created_at: DateTime<Utc>,
}

/// An observed transition. Never duplicated for an identical
/// `(from_node, action)` pair; multiple edges between the same node pair are
/// allowed when different actions lead to the same destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_node: String,
    pub to_node: String,
    pub action: Action,
    pub created_at: DateTime<Utc>,
}

/// Traversal order for frontier expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Bfs,
    Dfs,
}

/// Run-level descriptors and budgets for one crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlMetadata {
    /// Target bot identifier (e.g. @username).
    pub target: String,
    pub max_depth: u32,
    pub max_nodes: usize,
    pub max_edges: usize,
    pub max_actions: u64,
    pub strategy: Strategy,
}

impl CrawlMetadata {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            max_depth: 5,
            max_nodes: 100,
            max_edges: 400,
            max_actions: 500,
            strategy: Strategy::Bfs,
        }
    }
}

/// The durable crawl artifact handed to the replay engine:
/// metadata + nodes keyed by id + append-only edge list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotMap {
    pub metadata: CrawlMetadata,
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
}

impl BotMap {
    pub fn new(metadata: CrawlMetadata) -> Self {
        Self {
            metadata,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    /// Inserts a node unless one with the same id already exists.
    /// First-seen wins: an existing node (including its `example_path`) is
    /// never replaced. Returns true if the node was new.
    pub fn insert_node(&mut self, node: Node) -> bool {
        match self.nodes.entry(node.id.clone()) {
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(node);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Appends an edge unless one with the same `(from_node, action key)`
    /// already exists. Returns true if the edge was appended.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        let key = edge.action.key();
        let duplicate = self
            .edges
            .iter()
            .any(|e| e.from_node == edge.from_node && e.action.key() == key);
        if duplicate {
            return false;
        }
        self.edges.push(edge);
        true
    }
}

/// One frontier entry: a discovered-but-not-expanded node with the path that
/// reached it and its depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub node_id: String,
    pub path: Vec<Action>,
    pub depth: u32,
}

/// Resumable crawl progress, independent of the [`BotMap`].
///
/// Every decision-relevant field round-trips losslessly through
/// serialization: reloading a checkpoint must reproduce identical dedup/ban
/// decisions as if the crawl had never stopped. Field names are stable across
/// versions; maps/sets are ordered so serialized form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlCheckpoint {
    /// Node ids already fully expanded.
    pub visited_signatures: BTreeSet<String>,
    /// Frontier, in queue order.
    pub queue: Vec<FrontierEntry>,
    /// Path from the start screen to the node currently being expanded.
    pub current_path: Vec<Action>,
    /// node id -> set of permanently banned action keys.
    pub action_bans: BTreeMap<String, BTreeSet<String>>,
    /// node id -> action key -> execution attempts (including failures).
    pub action_attempts: BTreeMap<String, BTreeMap<String, u32>>,
    /// node id -> action key -> id of the node the action last produced.
    pub action_last_result: BTreeMap<String, BTreeMap<String, String>>,
    /// node id -> action key -> consecutive identical-result count.
    pub action_repeat_counts: BTreeMap<String, BTreeMap<String, u32>>,
    /// Signature of the last observed screen.
    pub last_signature: Option<String>,
    /// Consecutive steps the overall screen signature stayed identical.
    pub same_signature_repeat: u32,
    /// Action keys executed from the node currently being expanded.
    pub last_actions: Vec<String>,
    /// Index into the current node's action list where a resumed crawl
    /// continues, so the node is not replayed from action 0.
    pub last_start_action_index: usize,
    /// Total actions executed this run (budget accounting).
    pub actions_taken: u64,
}
