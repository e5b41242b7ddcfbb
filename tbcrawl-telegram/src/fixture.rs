//! Scripted [`RemoteBotClient`]: a deterministic in-memory bot described by a
//! JSON script. Used for dry runs from the CLI and as the crawl-loop test
//! double, so the full crawler path can run without a live Telegram session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use tbcrawl_core::{Action, RemoteError};

use crate::adapters::{BareButton, RemoteMarkup, RemoteMessage};
use crate::client::RemoteBotClient;

/// One screen of the scripted bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureScreen {
    pub text: String,
    /// Rows of bare buttons; normalized by the Button Extractor like any
    /// other markup.
    #[serde(default)]
    pub buttons: Vec<Vec<BareButton>>,
    #[serde(default)]
    pub media_types: Vec<String>,
}

impl FixtureScreen {
    fn to_message(&self) -> RemoteMessage {
        let markup = if self.buttons.is_empty() {
            None
        } else {
            Some(RemoteMarkup::Bare(self.buttons.clone()))
        };
        RemoteMessage {
            text: self.text.clone(),
            markup,
            media_types: self.media_types.clone(),
        }
    }
}

/// A whole scripted bot: named screens plus a transition table keyed by
/// `"screen_name|action_key"`. A `"*|action_key"` entry matches from any
/// screen (global commands like /start). Unknown actions leave the bot on
/// the same screen, which is exactly how no-op buttons behave on real bots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureScript {
    pub start: String,
    pub screens: HashMap<String, FixtureScreen>,
    pub transitions: HashMap<String, String>,
}

impl FixtureScript {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let script: FixtureScript = serde_json::from_str(&raw)?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !self.screens.contains_key(&self.start) {
            anyhow::bail!("fixture script: start screen {:?} not defined", self.start);
        }
        for target in self.transitions.values() {
            if !self.screens.contains_key(target) {
                anyhow::bail!("fixture script: transition target {:?} not defined", target);
            }
        }
        Ok(())
    }
}

/// Script-driven implementation of [`RemoteBotClient`].
pub struct FixtureClient {
    script: FixtureScript,
    current: Mutex<String>,
}

impl FixtureClient {
    pub fn new(script: FixtureScript) -> Self {
        let start = script.start.clone();
        Self {
            script,
            current: Mutex::new(start),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(Self::new(FixtureScript::from_file(path)?))
    }

    fn screen(&self, name: &str) -> Result<RemoteMessage, RemoteError> {
        self.script
            .screens
            .get(name)
            .map(FixtureScreen::to_message)
            .ok_or_else(|| RemoteError::Disconnected(format!("unknown screen {:?}", name)))
    }
}

#[async_trait]
impl RemoteBotClient for FixtureClient {
    async fn send_action(&self, action: &Action) -> Result<RemoteMessage, RemoteError> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| RemoteError::Disconnected("fixture state poisoned".to_string()))?;
        let key = format!("{}|{}", *current, action.key());
        let wildcard = format!("*|{}", action.key());
        if let Some(next) = self
            .script
            .transitions
            .get(&key)
            .or_else(|| self.script.transitions.get(&wildcard))
        {
            debug!(from = %*current, to = %next, action = %action.key(), "fixture transition");
            *current = next.clone();
        } else {
            debug!(screen = %*current, action = %action.key(), "fixture: no transition, staying");
        }
        self.screen(&current)
    }

    async fn await_response(&self, _timeout: Duration) -> Result<RemoteMessage, RemoteError> {
        let current = self
            .current
            .lock()
            .map_err(|_| RemoteError::Disconnected("fixture state poisoned".to_string()))?;
        self.screen(&current)
    }
}
