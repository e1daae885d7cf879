//! Odds Composer - real-time odds ingestion and broadcast server
//!
//! Ingests sports-market JSON payloads over HTTP, reshapes them into a
//! per-player/per-market fixture document, and fans the result out to
//! every connected WebSocket and SSE client.

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use odds_composer_backend::{
    api::{create_router, AppState},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing();

    info!("🚀 Odds Composer starting");

    let state = AppState::new(&config);
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);
    info!("📡 SSE URL: http://localhost:{}/api/events", config.port);
    info!("🔌 WebSocket URL: ws://localhost:{}/ws", config.port);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing with enhanced observability
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "odds_composer_backend=debug,odds_composer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
