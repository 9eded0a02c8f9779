//! Telegram adapter (teloxide).
//!
//! This crate implements the `tbot-core` Transport over the Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{net::Download, prelude::*, types::AllowedUpdate};

use tokio::time::sleep;

pub mod router;

use tbot_core::{
    domain::{Attachment, ChatId, FileLocation, FileRef, Sender, Update, UpdateId, UserId},
    errors::Error,
    transport::{Transport, TransportError, TransportResult},
    Result,
};

/// Margin on top of the long-poll timeout before the HTTP client gives up.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Build a bot whose HTTP client outlives a long poll of `poll_timeout`.
    pub fn connect(token: impl Into<String>, poll_timeout: Duration) -> Result<Self> {
        let client: reqwest::Client = teloxide::net::default_reqwest_settings()
            .timeout(poll_timeout + CLIENT_TIMEOUT_SLACK)
            .build()
            .map_err(|e| Error::External(format!("failed to build http client: {e}")))?;
        Ok(Self::new(Bot::with_client(token, client)))
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> TransportError {
        match e {
            teloxide::RequestError::Api(api) => TransportError::Api {
                description: api.to_string(),
            },
            teloxide::RequestError::RetryAfter(d) => TransportError::RetryAfter(d),
            teloxide::RequestError::Network(net) => match net.status() {
                Some(status) => TransportError::Status {
                    code: status.as_u16(),
                },
                None => TransportError::Network(net.to_string()),
            },
            teloxide::RequestError::InvalidJson { source, .. } => {
                TransportError::Malformed(source.to_string())
            }
            other => TransportError::Network(other.to_string()),
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> TransportResult<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Convert a Telegram update into the core model.
///
/// Anything that is not a plain message keeps its id (the cursor must still move past
/// it) but carries no chat, sender or attachment.
pub fn map_update(update: teloxide::types::Update) -> Update {
    let id = UpdateId(update.id);
    let teloxide::types::UpdateKind::Message(msg) = update.kind else {
        return Update {
            id,
            chat_id: None,
            sender: None,
            attachment: None,
        };
    };

    let sender = msg.from().map(|u| Sender {
        user_id: UserId(u.id.0),
        username: u.username.clone(),
    });
    let attachment = msg.document().map(|doc| Attachment {
        file_ref: FileRef(doc.file.id.clone()),
        file_name: doc.file_name.clone(),
        declared_size: u64::from(doc.file.size),
    });

    Update {
        id,
        chat_id: Some(ChatId(msg.chat.id.0)),
        sender,
        attachment,
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn fetch_updates(
        &self,
        offset: Option<UpdateId>,
        timeout: Duration,
    ) -> TransportResult<Vec<Update>> {
        let timeout_secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        let mut req = self
            .bot
            .get_updates()
            .timeout(timeout_secs)
            .allowed_updates(vec![AllowedUpdate::Message]);
        if let Some(offset) = offset {
            req = req.offset(offset.0);
        }

        let updates = req.await.map_err(Self::map_err)?;
        Ok(updates.into_iter().map(map_update).collect())
    }

    async fn send_reply(&self, chat_id: ChatId, text: &str) -> TransportResult<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
        })
        .await?;
        Ok(())
    }

    async fn resolve_file(&self, file_ref: &FileRef) -> TransportResult<Option<FileLocation>> {
        let file = self
            .bot
            .get_file(file_ref.0.clone())
            .await
            .map_err(Self::map_err)?;
        if file.path.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(FileLocation(file.path)))
    }

    async fn fetch_bytes(&self, location: &FileLocation) -> TransportResult<Vec<u8>> {
        let mut buf: Vec<u8> = Vec::new();
        self.bot
            .download_file(&location.0, &mut buf)
            .await
            .map_err(|e| match e {
                teloxide::DownloadError::Network(net) => match net.status() {
                    Some(status) => TransportError::Status {
                        code: status.as_u16(),
                    },
                    None => TransportError::Network(net.to_string()),
                },
                other => TransportError::Network(other.to_string()),
            })?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Decode from text the way updates arrive over the wire; teloxide's
    // `Update` does not deserialize correctly from a `Value`.
    fn tg_update(v: serde_json::Value) -> teloxide::types::Update {
        serde_json::from_str(&v.to_string()).unwrap()
    }

    #[test]
    fn maps_document_message() {
        let u = map_update(tg_update(serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": { "id": 7, "type": "private", "first_name": "Alice" },
                "from": { "id": 7, "is_bot": false, "first_name": "Alice", "username": "alice" },
                "document": {
                    "file_id": "F1",
                    "file_unique_id": "U1",
                    "file_name": "plan.torrent",
                    "mime_type": "application/x-bittorrent",
                    "file_size": 1234
                }
            }
        })));

        assert_eq!(u.id, UpdateId(10));
        assert_eq!(u.chat_id, Some(ChatId(7)));
        assert_eq!(
            u.sender,
            Some(Sender {
                user_id: UserId(7),
                username: Some("alice".to_string()),
            })
        );
        assert_eq!(
            u.attachment,
            Some(Attachment {
                file_ref: FileRef("F1".to_string()),
                file_name: Some("plan.torrent".to_string()),
                declared_size: 1234,
            })
        );
    }

    #[test]
    fn maps_text_message_without_attachment() {
        let u = map_update(tg_update(serde_json::json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "date": 1700000000,
                "chat": { "id": 7, "type": "private", "first_name": "Alice" },
                "from": { "id": 7, "is_bot": false, "first_name": "Alice" },
                "text": "hello"
            }
        })));

        assert_eq!(u.id, UpdateId(11));
        assert_eq!(u.chat_id, Some(ChatId(7)));
        assert!(u.sender.is_some());
        assert!(u.attachment.is_none());
        assert_eq!(u.sender.and_then(|s| s.username), None);
    }
}
