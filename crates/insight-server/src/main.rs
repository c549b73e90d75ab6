mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use insight_api::auth::{AppState, AppStateInner};
use insight_dataset::storage::DiskStore;
use insight_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insight_server=debug,insight_api=debug,insight_db=debug,insight_dataset=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and dataset storage
    let db = Database::open(&config.db_path)?;
    let store = DiskStore::new(config.upload_dir.clone())?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        store: Arc::new(store),
        jwt_secret: config.jwt_secret.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = insight_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("InsightHub listening on {}", addr);
    info!("Uploads limited to {} bytes", config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
