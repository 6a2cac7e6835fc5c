//! Prediction cache
//!
//! Completed streaming runs are kept per video id so a repeat demo replays
//! from cache instead of re-running inference. In-memory only; the cache
//! lives as long as the server process.

use chrono::{DateTime, Utc};
use ods_core::model::{DemoKind, TelemetryRecord};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CachedRun {
    pub kind: DemoKind,
    pub records: Vec<TelemetryRecord>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PredictionCache {
    runs: HashMap<String, CachedRun>,
}

impl PredictionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a completed run, replacing any previous run for the video
    pub fn store(&mut self, video_id: &str, kind: DemoKind, records: Vec<TelemetryRecord>) {
        debug!(video_id, ?kind, count = records.len(), "caching completed run");
        self.runs.insert(
            video_id.to_string(),
            CachedRun {
                kind,
                records,
                created_at: Utc::now(),
            },
        );
    }

    pub fn get(&self, video_id: &str) -> Option<&CachedRun> {
        self.runs.get(video_id)
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.runs.contains_key(video_id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
