//! Core domain + application logic for the torrent ingestion bot.
//!
//! This crate is intentionally framework-agnostic. The Telegram Bot API lives behind
//! the [`transport::Transport`] port, implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod downloader;
pub mod errors;
pub mod filter;
pub mod hash_store;
pub mod logging;
pub mod naming;
pub mod poll;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
