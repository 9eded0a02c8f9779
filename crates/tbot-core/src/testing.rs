//! Shared test fixtures: temp dirs and an in-memory transport.

use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{Attachment, ChatId, FileLocation, FileRef, Sender, Update, UpdateId, UserId},
    transport::{Transport, TransportError, TransportResult},
};

static TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn tmp_dir(prefix: &str) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_nanos();
    let n = TMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = PathBuf::from(format!("/tmp/{prefix}-{}-{ts}-{n}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn document_update(id: i32, username: &str, chat: i64, name: &str, size: u64) -> Update {
    Update {
        id: UpdateId(id),
        chat_id: Some(ChatId(chat)),
        sender: Some(Sender {
            user_id: UserId(chat as u64),
            username: Some(username.to_string()),
        }),
        attachment: Some(Attachment {
            file_ref: FileRef(format!("file-{id}")),
            file_name: Some(name.to_string()),
            declared_size: size,
        }),
    }
}

pub fn text_update(id: i32, username: &str, chat: i64) -> Update {
    Update {
        id: UpdateId(id),
        chat_id: Some(ChatId(chat)),
        sender: Some(Sender {
            user_id: UserId(chat as u64),
            username: Some(username.to_string()),
        }),
        attachment: None,
    }
}

/// Scripted transport. Batches are handed out in order; once exhausted every fetch
/// returns an empty batch.
#[derive(Default)]
pub struct FakeTransport {
    batches: Mutex<VecDeque<TransportResult<Vec<Update>>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    unresolvable: Mutex<Vec<String>>,
    failing_downloads: Mutex<Vec<String>>,
    offsets: Mutex<Vec<Option<UpdateId>>>,
    replies: Mutex<Vec<(ChatId, String)>>,
    downloads: AtomicUsize,
    failing_replies: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, batch: Vec<Update>) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self, err: TransportError) {
        self.batches.lock().unwrap().push_back(Err(err));
    }

    /// Serve `bytes` for the attachment of update `update_id` (see `document_update`).
    pub fn add_file(&self, update_id: i32, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(format!("file-{update_id}"), bytes.to_vec());
    }

    pub fn make_unresolvable(&self, update_id: i32) {
        self.unresolvable
            .lock()
            .unwrap()
            .push(format!("file-{update_id}"));
    }

    pub fn fail_download(&self, update_id: i32) {
        self.failing_downloads
            .lock()
            .unwrap()
            .push(format!("path/file-{update_id}"));
    }

    /// Make every `send_reply` fail after recording the attempt.
    pub fn fail_replies(&self) {
        self.failing_replies.store(true, Ordering::SeqCst);
    }

    pub fn replies(&self) -> Vec<(ChatId, String)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn reply_texts(&self) -> Vec<String> {
        self.replies().into_iter().map(|(_, t)| t).collect()
    }

    pub fn offsets(&self) -> Vec<Option<UpdateId>> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_updates(
        &self,
        offset: Option<UpdateId>,
        _timeout: Duration,
    ) -> TransportResult<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_reply(&self, chat_id: ChatId, text: &str) -> TransportResult<()> {
        self.replies
            .lock()
            .unwrap()
            .push((chat_id, text.to_string()));
        if self.failing_replies.load(Ordering::SeqCst) {
            return Err(TransportError::Status { code: 403 });
        }
        Ok(())
    }

    async fn resolve_file(&self, file_ref: &FileRef) -> TransportResult<Option<FileLocation>> {
        if self.unresolvable.lock().unwrap().contains(&file_ref.0) {
            return Ok(None);
        }
        if !self.files.lock().unwrap().contains_key(&file_ref.0) {
            return Err(TransportError::Api {
                description: "Bad Request: invalid file_id".to_string(),
            });
        }
        Ok(Some(FileLocation(format!("path/{}", file_ref.0))))
    }

    async fn fetch_bytes(&self, location: &FileLocation) -> TransportResult<Vec<u8>> {
        if self.failing_downloads.lock().unwrap().contains(&location.0) {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let key = location.0.trim_start_matches("path/");
        self.files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(TransportError::Status { code: 404 })
    }
}
