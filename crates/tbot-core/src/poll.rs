use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    config::Config,
    domain::{Update, UpdateId},
    downloader::Downloader,
    filter::{AllowList, Decision, Rejection, UpdateFilter},
    hash_store::ContentHashStore,
    transport::Transport,
};

pub const REPLY_ACCEPTED: &str = "you sent torrent file";

/// Sleep abstraction so tests can run the loop without waiting.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Real-time pause backed by the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    /// Server-side long-poll timeout.
    pub poll_timeout: Duration,
    /// Fixed pause after a failed fetch so a dead network does not spin the loop.
    pub error_pause: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(60),
            error_pause: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for PollSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_timeout: cfg.poll_timeout,
            error_pause: cfg.error_pause,
        }
    }
}

/// Process-wide state shared by every stage of the pipeline.
#[derive(Debug)]
pub struct Session {
    /// Next update to request. `None` until the first batch arrives.
    pub cursor: Option<UpdateId>,
    pub allow_list: AllowList,
    pub hashes: Arc<ContentHashStore>,
    pub store_dir: PathBuf,
}

impl Session {
    pub fn new(allow_list: AllowList, hashes: Arc<ContentHashStore>, store_dir: PathBuf) -> Self {
        Self {
            cursor: None,
            allow_list,
            hashes,
            store_dir,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Idle,
    AwaitingBatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Empty,
    TransportError,
    Processed {
        updates: usize,
        next_offset: UpdateId,
    },
}

/// Long-poll loop: fetch a batch, run every update through filter and downloader in
/// arrival order, then move the cursor past the batch.
pub struct PollLoop {
    transport: Arc<dyn Transport>,
    session: Session,
    filter: UpdateFilter,
    downloader: Downloader,
    pause: Arc<dyn Pause>,
    settings: PollSettings,
    state: PollState,
}

impl PollLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Session,
        pause: Arc<dyn Pause>,
        settings: PollSettings,
    ) -> Self {
        let filter = UpdateFilter::new(session.allow_list.clone());
        let downloader = Downloader::new(
            transport.clone(),
            session.store_dir.clone(),
            session.hashes.clone(),
        );
        Self {
            transport,
            session,
            filter,
            downloader,
            pause,
            settings,
            state: PollState::Idle,
        }
    }

    pub fn cursor(&self) -> Option<UpdateId> {
        self.session.cursor
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Poll forever.
    pub async fn run(&mut self) {
        tracing::info!(
            store_dir = %self.session.store_dir.display(),
            allowed_users = self.session.allow_list.len(),
            "polling for updates"
        );
        loop {
            self.poll_once().await;
        }
    }

    /// Run exactly `cycles` poll cycles and return their outcomes.
    pub async fn run_cycles(&mut self, cycles: usize) -> Vec<CycleOutcome> {
        let mut out = Vec::with_capacity(cycles);
        for _ in 0..cycles {
            out.push(self.poll_once().await);
        }
        out
    }

    pub async fn poll_once(&mut self) -> CycleOutcome {
        self.state = PollState::AwaitingBatch;
        let fetched = self
            .transport
            .fetch_updates(self.session.cursor, self.settings.poll_timeout)
            .await;
        self.state = PollState::Idle;

        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, cursor = ?self.session.cursor, "failed to fetch updates");
                self.pause.pause(self.settings.error_pause).await;
                return CycleOutcome::TransportError;
            }
        };

        let Some(last) = batch.last().map(|u| u.id.next()) else {
            return CycleOutcome::Empty;
        };

        for update in &batch {
            self.process(update).await;
        }

        let next_offset = match self.session.cursor {
            Some(current) if current > last => current,
            _ => last,
        };
        self.session.cursor = Some(next_offset);
        tracing::debug!(updates = batch.len(), next_offset = %next_offset, "batch processed");

        CycleOutcome::Processed {
            updates: batch.len(),
            next_offset,
        }
    }

    async fn process(&self, update: &Update) {
        let req = match self.filter.accept(update) {
            Decision::Download(req) => req,
            Decision::Reject(rejection) => {
                self.reject(update, rejection).await;
                return;
            }
        };

        tracing::info!(
            update_id = %update.id,
            chat_id = req.chat_id.0,
            file_name = %req.file_name,
            declared_size = req.declared_size,
            "torrent file received"
        );
        if let Err(e) = self.transport.send_reply(req.chat_id, REPLY_ACCEPTED).await {
            tracing::warn!(chat_id = req.chat_id.0, error = %e, "failed to send reply");
        }

        match self.downloader.download(&req).await {
            Ok(outcome) => {
                tracing::debug!(update_id = %update.id, outcome = ?outcome, "attachment handled");
            }
            Err(e) => {
                tracing::error!(
                    update_id = %update.id,
                    file_name = %req.file_name,
                    error = %e,
                    "download failed, skipping"
                );
            }
        }
    }

    async fn reject(&self, update: &Update, rejection: Rejection) {
        let Some((chat_id, text)) = rejection.reply() else {
            tracing::debug!(update_id = %update.id, reason = ?rejection, "update ignored");
            return;
        };

        tracing::warn!(update_id = %update.id, chat_id = chat_id.0, "{text}");
        if let Err(e) = self.transport.send_reply(chat_id, &text).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
        }
    }
}
