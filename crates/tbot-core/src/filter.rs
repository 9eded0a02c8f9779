use std::collections::HashSet;

use crate::{
    domain::{ChatId, FileRef, Sender, Update},
    naming::sanitize_file_name,
};

/// Largest declared attachment size the bot will fetch (Telegram's bot download limit).
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// The only attachment class the bot stores.
pub const REQUIRED_EXTENSION: &str = ".torrent";

// ============== Authorization ==============

/// Static set of usernames allowed to send files.
///
/// Usernames are stored without a leading `@` and compared case-insensitively,
/// the way Telegram treats them.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    usernames: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            usernames: usernames
                .into_iter()
                .map(|u| normalize_username(u.as_ref()))
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    pub fn is_authorized(&self, sender: Option<&Sender>) -> bool {
        let Some(username) = sender.and_then(|s| s.username.as_deref()) else {
            return false;
        };
        self.usernames.contains(&normalize_username(username))
    }

    pub fn len(&self) -> usize {
        self.usernames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usernames.is_empty()
    }
}

fn normalize_username(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_lowercase()
}

// ============== Decisions ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub chat_id: ChatId,
    pub file_ref: FileRef,
    /// Already sanitized; safe to use as a single path component.
    pub file_name: String,
    pub declared_size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No chat to answer in (channel posts, edits, other non-message updates).
    NotAMessage,
    UnauthorizedSender {
        chat_id: ChatId,
        username: Option<String>,
    },
    NoAttachment,
    TooLarge {
        declared_size: u64,
    },
    WrongExtension {
        file_name: String,
    },
}

impl Rejection {
    /// Only unauthorized senders are told about the rejection; everything else is
    /// silently ignored.
    pub fn reply(&self) -> Option<(ChatId, String)> {
        match self {
            Rejection::UnauthorizedSender { chat_id, username } => Some((
                *chat_id,
                format!(
                    "User with username {} is not allowed to send files",
                    username.as_deref().unwrap_or("unknown")
                ),
            )),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Reject(Rejection),
    Download(DownloadRequest),
}

// ============== Filter ==============

#[derive(Clone, Debug)]
pub struct UpdateFilter {
    allow_list: AllowList,
    max_file_size: u64,
}

impl UpdateFilter {
    pub fn new(allow_list: AllowList) -> Self {
        Self {
            allow_list,
            max_file_size: MAX_FILE_SIZE,
        }
    }

    /// Decide what to do with one update. Checks run in order: authorization,
    /// attachment presence, then declared size and extension.
    pub fn accept(&self, update: &Update) -> Decision {
        let Some(chat_id) = update.chat_id else {
            return Decision::Reject(Rejection::NotAMessage);
        };

        if !self.allow_list.is_authorized(update.sender.as_ref()) {
            return Decision::Reject(Rejection::UnauthorizedSender {
                chat_id,
                username: update.sender.as_ref().and_then(|s| s.username.clone()),
            });
        }

        let Some(attachment) = &update.attachment else {
            return Decision::Reject(Rejection::NoAttachment);
        };

        if attachment.declared_size > self.max_file_size {
            return Decision::Reject(Rejection::TooLarge {
                declared_size: attachment.declared_size,
            });
        }

        let file_name = sanitize_file_name(attachment.file_name.as_deref().unwrap_or_default());
        if !file_name.ends_with(REQUIRED_EXTENSION) {
            return Decision::Reject(Rejection::WrongExtension { file_name });
        }

        Decision::Download(DownloadRequest {
            chat_id,
            file_ref: attachment.file_ref.clone(),
            file_name,
            declared_size: attachment.declared_size,
        })
    }
}
