use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from the remote bot transport. Transient per-step; never crawl-fatal
/// on their own (the crawler retries a bounded number of times, then records
/// the action as failed and moves on).
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Send failed: {0}")]
    Send(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
