use std::sync::Arc;

use tracing::error;

use sack_db::MarketStore;
use sack_types::error::MarketResult;

use crate::error::{ApiError, ApiResult};
use crate::storage::ImageStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn MarketStore>,
    pub images: ImageStore,
    pub auth: AuthConfig,
}

/// Token signing settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    /// Runs a store call on the blocking pool. The store serializes writers
    /// on a mutex, so it must never run on a runtime worker.
    pub async fn run<T, F>(&self, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MarketStore) -> MarketResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| {
                error!("Store task failed: {}", e);
                ApiError::Internal(format!("store task failed: {e}"))
            })?
            .map_err(ApiError::from)
    }
}
