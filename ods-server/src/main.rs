//! OpenDriveSync Demo Backend
//!
//! Serves the media catalog, the prediction cache, and the streaming
//! prediction endpoint backed by the synthetic engine.

use anyhow::Result;
use ods_server::{api, engine::SyntheticEngine, library::MediaLibrary, state};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting OpenDriveSync Demo Backend");

    let config = state::ServerConfig::from_env();
    let library = match MediaLibrary::scan(&config.media_dir) {
        Ok(library) => library,
        Err(e) => {
            warn!(
                media_dir = %config.media_dir.display(),
                error = %e,
                "media directory unavailable; starting with an empty library"
            );
            MediaLibrary::empty()
        }
    };

    let state = state::AppState::new(Arc::new(SyntheticEngine::new()), library);
    let app = api::create_router(state);

    info!("Server listening on http://{}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
