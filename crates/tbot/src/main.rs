use std::sync::Arc;

use tbot_core::{config::Config, hash_store::ContentHashStore};

#[tokio::main]
async fn main() -> Result<(), tbot_core::Error> {
    tbot_core::logging::init("tbot")?;

    let cfg = Arc::new(Config::load().inspect_err(|e| tracing::error!("{e}"))?);

    // Seeding must finish before the first poll: a partial index lets duplicates in.
    let store_path = cfg.store_path.clone();
    let hashes = tokio::task::spawn_blocking(move || ContentHashStore::seed(&store_path))
        .await
        .map_err(|e| tbot_core::Error::External(format!("hash store seeding panicked: {e}")))?
        .inspect_err(|e| tracing::error!("cannot index {}: {e}", cfg.store_path.display()))?;
    tracing::info!(files = hashes.len(), "hash store seeded");

    tbot_telegram::router::run_polling(cfg, Arc::new(hashes))
        .await
        .map_err(|e| tbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
