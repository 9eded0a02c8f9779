use std::sync::Arc;

use teloxide::prelude::*;

use tbot_core::{
    config::Config,
    domain::ChatId,
    hash_store::ContentHashStore,
    poll::{PollLoop, PollSettings, Session, TokioPause},
    transport::Transport,
};

use crate::TelegramTransport;

/// Connect to Telegram and poll forever.
///
/// `hashes` must already be seeded from `cfg.store_path`.
pub async fn run_polling(cfg: Arc<Config>, hashes: Arc<ContentHashStore>) -> anyhow::Result<()> {
    let tg = TelegramTransport::connect(cfg.telegram_bot_token.clone(), cfg.poll_timeout)?;

    // Basic startup info.
    match tg.bot().get_me().await {
        Ok(me) => tracing::info!("tbot started: @{}", me.username()),
        Err(e) => tracing::warn!(error = %e, "getMe failed; continuing anyway"),
    }
    tracing::info!(
        store_path = %cfg.store_path.display(),
        allowed_users = cfg.allowed_usernames.len(),
        indexed_files = hashes.len(),
        "configuration loaded"
    );

    let transport: Arc<dyn Transport> = Arc::new(tg);

    if let Some(chat_id) = cfg.notify_chat_id {
        if let Err(e) = send_startup_notification(&transport, ChatId(chat_id), hashes.len()).await {
            tracing::warn!(chat_id, error = %e, "startup notification failed");
        }
    }

    let session = Session::new(cfg.allow_list(), hashes, cfg.store_path.clone());
    let mut poll = PollLoop::new(
        transport,
        session,
        Arc::new(TokioPause),
        PollSettings::from(cfg.as_ref()),
    );
    poll.run().await;

    Ok(())
}

async fn send_startup_notification(
    transport: &Arc<dyn Transport>,
    chat_id: ChatId,
    indexed: usize,
) -> anyhow::Result<()> {
    transport
        .send_reply(chat_id, &startup_message(indexed))
        .await?;
    Ok(())
}

fn startup_message(indexed: usize) -> String {
    format!("torrent bot started, {indexed} files indexed")
}
