//! The crawl loop: one sequential state machine per run.
//!
//! Exactly one action is in flight against the target bot at any time. The
//! unit of atomicity is a step (action sent, result observed, state updated,
//! checkpoint saved); cancellation and budgets are checked only at step
//! boundaries, so killing a crawl never leaves the checkpoint inconsistent
//! with the traces.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use policy::{classify_screen, input_candidates, Decision, DecisionPolicy, UiSnapshot};
use tbcrawl_core::{
    screen_signature, Action, BotMap, CrawlError, Edge, FrontierEntry, MediaInfo, Node, Result,
    ScreenType,
};
use tbcrawl_telegram::{extract_buttons, RemoteBotClient, RemoteMessage};

use crate::checkpoint;
use crate::config::{CrawlConfig, DecisionMode};
use crate::frontier::Frontier;
use crate::state::CrawlState;
use crate::trace::{infer_screen_label, state_snapshot, write_bot_map, TraceWriter};

/// Why the crawl ended. Budget exhaustion is a normal, successful
/// termination, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    FrontierEmpty,
    BudgetExceeded,
    Cancelled,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::FrontierEmpty => write!(f, "frontier empty"),
            TerminationReason::BudgetExceeded => write!(f, "budget exceeded"),
            TerminationReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Run result for CLI reporting. The bot map on disk is always valid, even
/// when partial.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub nodes: usize,
    pub edges: usize,
    pub actions_taken: u64,
    pub reason: TerminationReason,
}

enum NodeOutcome {
    Expanded,
    Backtracked,
    Stopped(TerminationReason),
}

enum StepOutcome {
    Continue,
    Backtrack,
}

/// One crawl run. Owns all mutable state exclusively; nothing is shared
/// across runs.
pub struct Crawler {
    config: CrawlConfig,
    client: Arc<dyn RemoteBotClient>,
    /// Operator-mode policy; `None` in assist mode.
    operator: Option<Arc<dyn DecisionPolicy>>,
    map: BotMap,
    state: CrawlState,
    frontier: Frontier,
    trace: TraceWriter,
    cancel: Arc<AtomicBool>,
    /// Signature of the screen the remote bot is currently showing, when
    /// known. Drives path-replay navigation between frontier nodes.
    current_screen: Option<String>,
    /// True right after a checkpoint reload: the first popped entry resumes
    /// at the saved action offset instead of action 0.
    resume_pending: bool,
    recent_failures: u32,
}

impl Crawler {
    /// Builds a crawler, resuming from `checkpoint.json` in the output
    /// directory when one exists. A corrupt checkpoint is a hard error for
    /// the resume path; a fresh crawl is unaffected (no file).
    pub fn new(
        config: CrawlConfig,
        client: Arc<dyn RemoteBotClient>,
        operator: Option<Arc<dyn DecisionPolicy>>,
    ) -> Result<Self> {
        if config.mode == DecisionMode::Operator && operator.is_none() {
            return Err(CrawlError::Config(
                "operator mode requires a decision policy".to_string(),
            ));
        }
        std::fs::create_dir_all(&config.out_dir)?;

        let loaded = checkpoint::load(config.checkpoint_path())?;
        let resume_pending = loaded.is_some();
        let mut state = match loaded {
            Some(cp) => CrawlState::from_checkpoint(cp),
            None => CrawlState::new(),
        };
        let frontier = Frontier::from_entries(config.metadata.strategy, state.take_queue());

        let map = Self::load_or_new_map(&config)?;
        let trace = TraceWriter::open(&config.out_dir)?.with_step(state.actions_taken());

        if resume_pending {
            info!(
                nodes = map.nodes.len(),
                queued = frontier.len(),
                actions = state.actions_taken(),
                "resuming crawl"
            );
        }

        Ok(Self {
            config,
            client,
            operator,
            map,
            state,
            frontier,
            trace,
            cancel: Arc::new(AtomicBool::new(false)),
            current_screen: None,
            resume_pending,
            recent_failures: 0,
        })
    }

    /// Like [`Crawler::new`] but fails when there is nothing to resume.
    pub fn resume(
        config: CrawlConfig,
        client: Arc<dyn RemoteBotClient>,
        operator: Option<Arc<dyn DecisionPolicy>>,
    ) -> Result<Self> {
        if checkpoint::load(config.checkpoint_path())?.is_none() {
            return Err(CrawlError::Checkpoint(format!(
                "no checkpoint at {}",
                config.checkpoint_path().display()
            )));
        }
        Self::new(config, client, operator)
    }

    fn load_or_new_map(config: &CrawlConfig) -> Result<BotMap> {
        let path = config.bot_map_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                CrawlError::Artifact(format!("corrupt bot map at {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(BotMap::new(config.metadata.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flag checked at step boundaries; setting it stops the crawl after the
    /// current step completes.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn budget_exceeded(&self) -> bool {
        let m = &self.config.metadata;
        self.map.nodes.len() >= m.max_nodes
            || self.map.edges.len() >= m.max_edges
            || self.state.actions_taken() >= m.max_actions
    }

    /// Runs the crawl to termination. Always leaves a valid (possibly
    /// partial) bot map on disk.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        if self.map.nodes.is_empty() {
            self.bootstrap().await?;
        }

        let reason = loop {
            if self.cancelled() {
                break TerminationReason::Cancelled;
            }
            if self.budget_exceeded() {
                break TerminationReason::BudgetExceeded;
            }
            let Some(entry) = self.frontier.pop() else {
                break TerminationReason::FrontierEmpty;
            };
            if self.state.is_visited(&entry.node_id) {
                continue;
            }

            match self.expand_node(&entry).await? {
                NodeOutcome::Expanded | NodeOutcome::Backtracked => {
                    self.state.mark_visited(&entry.node_id);
                    // The node is done; a checkpoint taken from here on must
                    // not carry its action offset into the next popped entry.
                    self.state.begin_node();
                }
                NodeOutcome::Stopped(reason) => {
                    // Not fully expanded: keep the entry for a later resume.
                    self.frontier.push_front(entry);
                    break reason;
                }
            }
            self.persist(None)?;
        };

        self.persist(None)?;
        write_bot_map(self.config.bot_map_path(), &self.map)?;
        info!(
            nodes = self.map.nodes.len(),
            edges = self.map.edges.len(),
            actions = self.state.actions_taken(),
            %reason,
            "crawl finished"
        );
        Ok(CrawlSummary {
            nodes: self.map.nodes.len(),
            edges: self.map.edges.len(),
            actions_taken: self.state.actions_taken(),
            reason,
        })
    }

    /// Observes the entry screen and seeds the frontier with the root node.
    /// Prefers a greeting the bot sends on its own; falls back to the start
    /// command.
    async fn bootstrap(&mut self) -> Result<()> {
        let message = match self.client.await_response(self.config.response_timeout).await {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "no greeting, sending start command");
                let start = Action::SendText {
                    value: self.config.start_command.clone(),
                };
                self.client.send_action(&start).await?
            }
        };

        let node = self.observe(&message, Vec::new());
        let root_id = node.id.clone();
        self.map.insert_node(node);
        self.current_screen = Some(root_id.clone());
        self.frontier.push(FrontierEntry {
            node_id: root_id.clone(),
            path: Vec::new(),
            depth: 0,
        });
        info!(root = %root_id, "root screen discovered");
        self.persist(None)
    }

    /// Builds a node from a raw remote message. The id is the screen
    /// signature; `example_path` is the path that reached it (first-seen
    /// wins via [`BotMap::insert_node`]).
    fn observe(&self, message: &RemoteMessage, path: Vec<Action>) -> Node {
        let extraction = extract_buttons(message);
        let id = screen_signature(&message.text, &extraction.buttons, message.has_media());
        let screen_type = classify_screen(&message.text, &extraction);
        Node {
            id,
            text: message.text.clone(),
            buttons: extraction.buttons.clone(),
            screen_type,
            media: MediaInfo {
                has_media: message.has_media(),
                media_types: message.media_types.clone(),
            },
            example_path: path,
            created_at: Utc::now(),
        }
    }

    async fn expand_node(&mut self, entry: &FrontierEntry) -> Result<NodeOutcome> {
        let Some(node) = self.map.nodes.get(&entry.node_id).cloned() else {
            warn!(node = %entry.node_id, "frontier entry for unknown node, skipping");
            return Ok(NodeOutcome::Expanded);
        };

        let start_index = if self.resume_pending {
            self.resume_pending = false;
            self.state.start_action_index()
        } else {
            self.state.begin_node();
            0
        };
        self.state.set_current_path(entry.path.clone());

        let actions = self.generate_actions(&node).await;
        debug!(node = %node.id, actions = actions.len(), start_index, "expanding node");

        for (index, action) in actions.iter().enumerate().skip(start_index) {
            if self.cancelled() {
                return Ok(NodeOutcome::Stopped(TerminationReason::Cancelled));
            }
            if self.budget_exceeded() {
                return Ok(NodeOutcome::Stopped(TerminationReason::BudgetExceeded));
            }
            let key = action.key();
            if self.state.is_banned(&node.id, &key) {
                debug!(node = %node.id, action = %key, "action banned, skipping");
                continue;
            }
            if !self.navigate_to(entry, &node).await {
                // Could not reach the node; record the miss and give up on
                // the remaining actions rather than clicking blind.
                self.recent_failures += 1;
                return Ok(NodeOutcome::Expanded);
            }

            match self.execute_step(&node, entry, action, index).await? {
                StepOutcome::Continue => {}
                StepOutcome::Backtrack => {
                    self.state.backtrack_current_path();
                    return Ok(NodeOutcome::Backtracked);
                }
            }
        }

        Ok(NodeOutcome::Expanded)
    }

    /// Brings the remote bot to `node` by replaying the start command plus
    /// the node's path. No-op when the bot is already there. Navigation
    /// sends do not count against the action budget.
    async fn navigate_to(&mut self, entry: &FrontierEntry, node: &Node) -> bool {
        if self.current_screen.as_deref() == Some(node.id.as_str()) {
            return true;
        }
        let start = Action::SendText {
            value: self.config.start_command.clone(),
        };
        let mut replay = Vec::with_capacity(entry.path.len() + 1);
        replay.push(&start);
        replay.extend(entry.path.iter());

        let mut last_signature = None;
        for action in replay {
            match self.client.send_action(action).await {
                Ok(message) => {
                    let extraction = extract_buttons(&message);
                    last_signature = Some(screen_signature(
                        &message.text,
                        &extraction.buttons,
                        message.has_media(),
                    ));
                }
                Err(e) => {
                    warn!(node = %node.id, error = %e, "navigation failed");
                    self.current_screen = None;
                    return false;
                }
            }
        }
        self.current_screen = last_signature.clone();
        if last_signature.as_deref() == Some(node.id.as_str()) {
            true
        } else {
            // The bot's behavior drifted since the path was recorded.
            warn!(node = %node.id, reached = ?last_signature, "path replay reached a different screen");
            false
        }
    }

    /// Executes one action with bounded retries, observes the result, and
    /// updates every dedup/ban structure plus the traces. Exactly one
    /// checkpoint write per completed step (at the configured interval).
    async fn execute_step(
        &mut self,
        node: &Node,
        entry: &FrontierEntry,
        action: &Action,
        index: usize,
    ) -> Result<StepOutcome> {
        let key = action.key();

        let mut message = None;
        for attempt in 0..=self.config.max_step_retries {
            self.state.record_attempt(&node.id, &key);
            match self.client.send_action(action).await {
                Ok(m) => {
                    message = Some(m);
                    break;
                }
                Err(e) => {
                    warn!(node = %node.id, action = %key, attempt, error = %e, "action failed");
                    self.recent_failures += 1;
                    self.current_screen = None;
                }
            }
        }
        let Some(message) = message else {
            // Transient errors exhausted the retry bound: recorded as a
            // failed action, never crawl-fatal.
            self.state.record_step_position(&key, index + 1);
            self.persist(Some(entry))?;
            return Ok(StepOutcome::Continue);
        };

        let observed_path = {
            let mut p = entry.path.clone();
            p.push(action.clone());
            p
        };
        let result_node = self.observe(&message, observed_path);
        let result_id = result_node.id.clone();
        self.current_screen = Some(result_id.clone());

        let signature_repeats = self.state.observe_signature(&result_id);
        self.state.record_action_result(
            &node.id,
            &key,
            &result_id,
            self.config.loop_repeat_threshold,
        );

        let is_new = self.map.insert_node(result_node);
        self.map.insert_edge(Edge {
            from_node: node.id.clone(),
            to_node: result_id.clone(),
            action: action.clone(),
            created_at: Utc::now(),
        });

        if is_new
            && !self.state.is_visited(&result_id)
            && entry.depth + 1 <= self.config.metadata.max_depth
        {
            let mut path = entry.path.clone();
            path.push(action.clone());
            self.frontier.push(FrontierEntry {
                node_id: result_id.clone(),
                path,
                depth: entry.depth + 1,
            });
        }

        // Traces first, then checkpoint: the checkpoint's actions_taken
        // matches the number of golden lines after every completed step.
        let state_out = match self.map.nodes.get(&result_id) {
            Some(n) => state_snapshot(n),
            None => json!({ "node_id": result_id }),
        };
        self.trace.append_step(
            state_snapshot(node),
            action,
            state_out,
            &infer_screen_label(&message.text),
        )?;
        self.state.count_action();
        self.state.record_step_position(&key, index + 1);
        self.persist(Some(entry))?;

        if signature_repeats > self.config.same_signature_threshold {
            // Stuck regardless of which action caused it: back off along the
            // current path instead of continuing forward.
            warn!(node = %node.id, repeats = signature_repeats, "same signature repeating, backtracking");
            self.state.reset_signature_guard();
            return Ok(StepOutcome::Backtrack);
        }
        Ok(StepOutcome::Continue)
    }

    /// One action per distinct `(kind, row, col, data-or-url)` key for menu
    /// screens; ranked input candidates (bounded) for input screens. In
    /// operator mode the LLM may prepend its own input value; rate limiting
    /// pauses, any other failure falls back to heuristics for the step.
    async fn generate_actions(&mut self, node: &Node) -> Vec<Action> {
        match node.screen_type {
            ScreenType::Menu => {
                let mut seen = HashSet::new();
                let mut actions = Vec::new();
                for row in &node.buttons {
                    for button in row {
                        if seen.insert(button.action_key()) {
                            actions.push(Action::Click {
                                button: button.clone(),
                            });
                        }
                    }
                }
                actions
            }
            ScreenType::InputRequired => {
                let mut values: Vec<String> = input_candidates(&node.text)
                    .into_iter()
                    .take(self.config.max_input_candidates)
                    .collect();
                if let Some(value) = self.operator_input(node).await {
                    if !values.contains(&value) {
                        values.insert(0, value);
                        values.truncate(self.config.max_input_candidates);
                    }
                }
                values
                    .into_iter()
                    .map(|value| Action::SendText { value })
                    .collect()
            }
            ScreenType::Terminal => Vec::new(),
        }
    }

    /// Asks the operator policy for an input value. Honors backoff by
    /// sleeping once and re-asking; every failure path degrades to the
    /// heuristic candidates.
    async fn operator_input(&mut self, node: &Node) -> Option<String> {
        let policy = self.operator.clone()?;
        let snapshot = self.snapshot(node);
        debug!(summary = %policy::operator::snapshot_summary(&snapshot), "operator consulted");

        for round in 0..2 {
            match policy.decide(&snapshot).await {
                Ok(Decision::SendText { value }) => return Some(value),
                Ok(Decision::BackoffSleep { seconds }) if round == 0 => {
                    info!(seconds, "rate limited, pausing before re-attempting node");
                    tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
                }
                Ok(other) => {
                    debug!(?other, "operator decision not usable for input, using heuristics");
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "operator policy failed, falling back to heuristics");
                    return None;
                }
            }
        }
        None
    }

    fn snapshot(&self, node: &Node) -> UiSnapshot {
        UiSnapshot {
            screen_text: node.text.clone(),
            screen_type: node.screen_type,
            buttons: node.buttons.iter().flatten().cloned().collect(),
            input_required: node.screen_type == ScreenType::InputRequired,
            visited_nodes: self.state.visited_count(),
            actions_taken: self.state.actions_taken(),
            recent_failures: self.recent_failures,
        }
    }

    /// Writes the checkpoint (and refreshes the bot map) at the configured
    /// interval. `current` is the entry being expanded, re-queued at the
    /// head so a resumed crawl continues exactly where this one stops.
    fn persist(&mut self, current: Option<&FrontierEntry>) -> Result<()> {
        let interval = self.config.checkpoint_interval.max(1);
        if current.is_some() && self.state.actions_taken() % interval != 0 {
            return Ok(());
        }
        let mut queue = Vec::with_capacity(self.frontier.len() + 1);
        if let Some(entry) = current {
            queue.push(entry.clone());
        }
        queue.extend(self.frontier.to_entries());
        checkpoint::save(self.config.checkpoint_path(), &self.state.to_checkpoint(queue))?;
        write_bot_map(self.config.bot_map_path(), &self.map)?;
        Ok(())
    }
}
