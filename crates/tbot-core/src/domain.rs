use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram update id. Also the unit of the polling cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateId(pub i32);

impl UpdateId {
    /// The offset that acknowledges this update and everything before it.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-internal file reference (Telegram `file_id`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileRef(pub String);

/// Transport-internal download location (Telegram `file_path`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileLocation(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub user_id: UserId,
    pub username: Option<String>,
}

/// Attachment metadata as declared by the transport. Nothing here is verified
/// against the bytes that are eventually downloaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub file_ref: FileRef,
    pub file_name: Option<String>,
    pub declared_size: u64,
}

/// One inbound event from the transport. Consumed once, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub id: UpdateId,
    pub chat_id: Option<ChatId>,
    pub sender: Option<Sender>,
    pub attachment: Option<Attachment>,
}
