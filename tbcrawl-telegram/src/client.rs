//! Remote bot client abstraction.
//!
//! The crawler drives the target bot through this trait and never assumes
//! more than "one response per one sent action". Implementations own the
//! actual transport (a user-session client, or the scripted
//! [`FixtureClient`](crate::fixture::FixtureClient)); the crawler keeps
//! exactly one action in flight by calling sequentially from a single loop.

use async_trait::async_trait;
use std::time::Duration;

use tbcrawl_core::{Action, RemoteError};

use crate::adapters::RemoteMessage;

/// Opaque, possibly-slow, possibly-failing remote dependency.
///
/// Both methods must observe the timeout internally; the remote bot is
/// untrusted for liveness.
#[async_trait]
pub trait RemoteBotClient: Send + Sync {
    /// Executes one action against the target bot and returns the resulting
    /// screen.
    async fn send_action(&self, action: &Action) -> Result<RemoteMessage, RemoteError>;

    /// Waits for the next message without sending anything (e.g. the initial
    /// greeting screen, or a delayed follow-up).
    async fn await_response(&self, timeout: Duration) -> Result<RemoteMessage, RemoteError>;
}
