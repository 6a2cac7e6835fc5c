//! Application state management

use crate::cache::PredictionCache;
use crate::engine::PredictionEngine;
use crate::library::MediaLibrary;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Catalog of demo clips and stills
    pub library: Arc<RwLock<MediaLibrary>>,

    /// Completed runs, replayable without re-running inference
    pub cache: Arc<RwLock<PredictionCache>>,

    /// The prediction source behind every streaming session
    pub engine: Arc<dyn PredictionEngine>,
}

impl AppState {
    pub fn new(engine: Arc<dyn PredictionEngine>, library: MediaLibrary) -> Self {
        Self {
            library: Arc::new(RwLock::new(library)),
            cache: Arc::new(RwLock::new(PredictionCache::new())),
            engine,
        }
    }
}

/// Environment-driven server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub media_dir: PathBuf,
}

impl ServerConfig {
    /// Read `ODS_ADDR` and `ODS_MEDIA_DIR`, falling back to the defaults
    pub fn from_env() -> Self {
        let addr = std::env::var("ODS_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 9300)));

        let media_dir = std::env::var("ODS_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_media_dir());

        Self { addr, media_dir }
    }
}

fn default_media_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("opendrivesync")
        .join("media")
}
