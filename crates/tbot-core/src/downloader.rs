use std::{path::PathBuf, sync::Arc};

use tokio::{fs, io::AsyncWriteExt};

use crate::{
    domain::ChatId,
    filter::DownloadRequest,
    hash_store::{ContentHashStore, Fingerprint},
    naming::resolve_file_name,
    transport::Transport,
    Result,
};

pub const REPLY_EXISTS: &str = "this torrent file exists";
pub const REPLY_DOWNLOADED: &str = "file downloaded";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A file with the same name and declared size is already stored.
    ExistsByName,
    /// The transport knows the file but gave no download location.
    Unresolved,
    /// Same bytes are already stored, possibly under another name.
    ExistsByContent(Fingerprint),
    Stored {
        path: PathBuf,
        fingerprint: Fingerprint,
    },
}

/// Fetches accepted attachments and stores them under the destination directory,
/// deduplicating by name+size and then by content.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    store_dir: PathBuf,
    hashes: Arc<ContentHashStore>,
}

impl Downloader {
    pub fn new(
        transport: Arc<dyn Transport>,
        store_dir: impl Into<PathBuf>,
        hashes: Arc<ContentHashStore>,
    ) -> Self {
        Self {
            transport,
            store_dir: store_dir.into(),
            hashes,
        }
    }

    /// Run one attachment through the pipeline.
    ///
    /// Transport errors are returned before anything touches the disk and without
    /// replying. Nothing is written until the full body has been received.
    pub async fn download(&self, req: &DownloadRequest) -> Result<DownloadOutcome> {
        if self.exists_by_name(&req.file_name, req.declared_size).await {
            tracing::info!(file_name = %req.file_name, "already stored (name and size match)");
            self.reply(req.chat_id, REPLY_EXISTS).await;
            return Ok(DownloadOutcome::ExistsByName);
        }

        let Some(location) = self.transport.resolve_file(&req.file_ref).await? else {
            tracing::error!(
                file_ref = %req.file_ref.0,
                "transport returned no download location for file"
            );
            return Ok(DownloadOutcome::Unresolved);
        };

        let bytes = self.transport.fetch_bytes(&location).await?;
        let fingerprint = Fingerprint::of_bytes(&bytes);

        if !self.hashes.insert_if_absent(fingerprint) {
            tracing::info!(
                file_name = %req.file_name,
                fingerprint = %fingerprint,
                "already stored (content match)"
            );
            self.reply(req.chat_id, REPLY_EXISTS).await;
            return Ok(DownloadOutcome::ExistsByContent(fingerprint));
        }

        let path = match self.write_new_file(&req.file_name, &bytes).await {
            Ok(path) => path,
            Err(e) => {
                self.hashes.forget(&fingerprint);
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            fingerprint = %fingerprint,
            "stored torrent file"
        );
        self.reply(req.chat_id, REPLY_DOWNLOADED).await;

        Ok(DownloadOutcome::Stored { path, fingerprint })
    }

    async fn exists_by_name(&self, file_name: &str, declared_size: u64) -> bool {
        match fs::metadata(self.store_dir.join(file_name)).await {
            Ok(md) => md.is_file() && md.len() == declared_size,
            Err(_) => false,
        }
    }

    /// Write under a collision-free name. `create_new` guarantees an existing file is
    /// never truncated even if one appears between name resolution and open.
    async fn write_new_file(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = resolve_file_name(file_name, &self.store_dir);
        let path = self.store_dir.join(name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(e.into());
        }
        Ok(path)
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.transport.send_reply(chat_id, text).await {
            tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send reply");
        }
    }
}
