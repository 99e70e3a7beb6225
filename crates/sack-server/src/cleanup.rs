use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use sack_db::MarketStore;

/// Background task that forgets revoked sessions whose tokens have expired
/// on their own.
pub async fn run_session_prune_loop(store: Arc<dyn MarketStore>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match prune_once(Arc::clone(&store)).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} expired revoked sessions", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

async fn prune_once(store: Arc<dyn MarketStore>) -> anyhow::Result<usize> {
    let count = tokio::task::spawn_blocking(move || store.prune_revoked_sessions(Utc::now())).await??;
    Ok(count)
}
