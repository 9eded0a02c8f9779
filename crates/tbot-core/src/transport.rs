use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ChatId, FileLocation, FileRef, Update, UpdateId};

/// Failure of a single transport call.
///
/// All variants are transient from the bot's point of view: the caller drops the
/// current unit of work and the next poll cycle proceeds normally.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected http status {code}")]
    Status { code: u16 },

    #[error("api error: {description}")]
    Api { description: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("rate limited, retry after {0:?}")]
    RetryAfter(Duration),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Messaging transport port.
///
/// Telegram is the only implementation; tests drive the core through an in-memory
/// fake. An empty batch from `fetch_updates` means "no new data" and is never an error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Long-poll for updates starting at `offset` (`None` = from the beginning).
    async fn fetch_updates(
        &self,
        offset: Option<UpdateId>,
        timeout: Duration,
    ) -> TransportResult<Vec<Update>>;

    async fn send_reply(&self, chat_id: ChatId, text: &str) -> TransportResult<()>;

    /// `Ok(None)` when the transport knows the file but has no download location for it.
    async fn resolve_file(&self, file_ref: &FileRef) -> TransportResult<Option<FileLocation>>;

    async fn fetch_bytes(&self, location: &FileLocation) -> TransportResult<Vec<u8>>;
}
