mod bootstrap;
mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use sack_api::router::build_router;
use sack_api::state::{AppState, AppStateInner, AuthConfig};
use sack_api::storage::ImageStore;
use sack_db::{Database, MarketStore};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "santas_sack=debug,sack_api=debug,sack_db=info,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Init database and image storage
    let db = Database::open(&config.db_path)?;
    let store: Arc<dyn MarketStore> = Arc::new(db);
    let images = ImageStore::new(config.image_dir.clone(), &config.public_url).await?;

    if let Some(admin) = config.admin.clone() {
        let admin_store = Arc::clone(&store);
        tokio::task::spawn_blocking(move || bootstrap::ensure_admin(admin_store.as_ref(), &admin))
            .await??;
    }

    tokio::spawn(cleanup::run_session_prune_loop(
        Arc::clone(&store),
        config.session_prune_secs,
    ));

    let state: AppState = Arc::new(AppStateInner {
        store,
        images,
        auth: AuthConfig {
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: chrono::Duration::hours(config.token_ttl_hours),
        },
    });

    // Bearer tokens only, no cookies.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(false);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Santa's Sack listening on {}", addr);
    info!("Serving toy images from {}", config.image_dir.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
