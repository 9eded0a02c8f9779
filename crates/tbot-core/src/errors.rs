use std::path::PathBuf;

use crate::transport::TransportError;

/// Core error type for the bot.
///
/// `Config` and `InvalidPath` are fatal at startup. `Transport` is transient: the
/// current unit of work is dropped and the poll loop carries on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
