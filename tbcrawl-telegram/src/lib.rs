//! # tbcrawl-telegram
//!
//! The Telegram-shaped boundary of the crawler. Normalizes the three button
//! markup representations seen in the wild (inline keyboard, reply keyboard,
//! bare button rows) into the uniform core [`Button`](tbcrawl_core::Button)
//! type, defines the [`RemoteBotClient`] trait the crawler drives, and ships
//! a scripted [`FixtureClient`] for dry runs and tests.

pub mod adapters;
pub mod client;
pub mod fixture;

pub use adapters::{extract_buttons, BareButton, ButtonExtraction, RemoteMarkup, RemoteMessage};
pub use client::RemoteBotClient;
pub use fixture::{FixtureClient, FixtureScreen, FixtureScript};
