//! OpenDriveSync Core Library
//!
//! This crate provides the telemetry data model, the append-only prediction
//! buffer, and the playback synchronizer that aligns a media clock with a
//! stream of inference results.

pub mod buffer;
pub mod error;
pub mod model;
pub mod sync;
pub mod units;

pub use buffer::PredictionBuffer;
pub use error::SessionError;
pub use model::{DemoKind, RawMessage, StartRequest, TelemetryPayload, TelemetryRecord};
pub use sync::{FrameCadence, LookupStrategy, MediaControl, PlaybackSynchronizer, SyncPhase};
