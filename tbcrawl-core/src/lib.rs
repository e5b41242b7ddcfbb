//! # tbcrawl-core
//!
//! Core types for the bot state-space crawler: the discovered-graph model
//! ([`BotMap`], [`Node`], [`Edge`], [`Button`], [`Action`]), the screen
//! signature engine, the crawl checkpoint shape, error taxonomy, and tracing
//! initialization. Transport-agnostic; used by tbcrawl-telegram, policy and
//! crawler.

pub mod error;
pub mod logger;
pub mod model;
pub mod signature;

pub use error::{CrawlError, RemoteError, Result};
pub use logger::init_tracing;
pub use model::{
    Action, BotMap, Button, ButtonKind, CrawlCheckpoint, CrawlMetadata, Edge, FrontierEntry,
    MediaInfo, Node, ScreenType, Strategy,
};
pub use signature::{normalize_action_text, normalize_screen_text, screen_signature};
