//! Playback synchronization state machine
//!
//! Owns the relationship between a media clock and a [`PredictionBuffer`].
//! Time-update ticks arrive at the media element's rate (tens of Hz); new
//! predictions arrive at the network's rate. The synchronizer decides which
//! buffered record is current, emits it at most once per index, and pauses
//! the media element whenever playback would outrun the data.
//!
//! Playback is forward-only: a tick that would move the cursor backward is
//! ignored, so emitted indices are strictly increasing for the lifetime of
//! a session.

use crate::buffer::PredictionBuffer;
use crate::model::TelemetryRecord;
use crate::units::Seconds;
use tracing::debug;

/// Media playback rate keeping consumption at or below the typical
/// inference production rate. Applied by the media owner, not by this type.
pub const DEFAULT_PLAYBACK_RATE: f64 = 0.5;

/// Phase of the synchronizer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No data yet; playback controls are disabled
    AwaitingFirstData,
    /// Data available, media paused
    Ready,
    Playing,
    Paused,
    /// Playback caught up with ingestion; media forcibly paused until the
    /// buffer grows
    Exhausted,
}

/// Fixed frame cadence of a clip: total duration over a known frame count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCadence {
    total_duration: Seconds,
    total_frames: u64,
}

impl FrameCadence {
    pub fn new(total_duration: Seconds, total_frames: u64) -> Self {
        Self {
            total_duration,
            total_frames: total_frames.max(1),
        }
    }

    /// Seconds of media time covered by one frame (e.g. 20 s / 601 frames)
    pub fn frame_duration(&self) -> f64 {
        self.total_duration.0 / self.total_frames as f64
    }

    /// Buffer index expected to be current at media time `t`
    pub fn expected_index(&self, t: Seconds) -> usize {
        (t.0.max(0.0) / self.frame_duration()).floor() as usize
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

/// How media time maps to a buffer index
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LookupStrategy {
    /// One record per frame at a fixed cadence; index derived from time
    FixedCadence(FrameCadence),
    /// Records carry their own timestamps; index found by time lookup
    Timestamped,
}

/// The consumed half of the media resource contract. Duration, time
/// position, and completion arrive as events; these are the commands the
/// synchronizer issues back.
pub trait MediaControl: Send {
    fn play(&mut self);
    fn pause(&mut self);
}

/// Invoked with the record that corresponds to "now", once per index change
pub type RecordCallback = Box<dyn FnMut(&TelemetryRecord) + Send>;

pub struct PlaybackSynchronizer {
    buffer: PredictionBuffer,
    strategy: LookupStrategy,
    phase: SyncPhase,
    last_emitted: Option<usize>,
    last_time: Seconds,
    stream_complete: bool,
    media: Box<dyn MediaControl>,
    on_record: RecordCallback,
}

impl PlaybackSynchronizer {
    /// Live-streaming mode: starts with an empty buffer, controls disabled
    /// until the first record arrives.
    pub fn new(
        strategy: LookupStrategy,
        media: Box<dyn MediaControl>,
        on_record: RecordCallback,
    ) -> Self {
        Self {
            buffer: PredictionBuffer::new(),
            strategy,
            phase: SyncPhase::AwaitingFirstData,
            last_emitted: None,
            last_time: Seconds(0.0),
            stream_complete: false,
            media,
            on_record,
        }
    }

    /// Cache-replay mode: the buffer is complete up front, so the machine
    /// starts in Ready and can never exhaust. Consumers of the record
    /// callback cannot tell this mode from live streaming.
    pub fn from_cache(
        records: Vec<TelemetryRecord>,
        strategy: LookupStrategy,
        media: Box<dyn MediaControl>,
        on_record: RecordCallback,
    ) -> Self {
        let mut buffer = PredictionBuffer::new();
        for record in records {
            buffer.append(record);
        }
        let phase = if buffer.is_empty() {
            SyncPhase::AwaitingFirstData
        } else {
            SyncPhase::Ready
        };
        Self {
            buffer,
            strategy,
            phase,
            last_emitted: None,
            last_time: Seconds(0.0),
            stream_complete: true,
            media,
            on_record,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Playback controls are enabled from the first record onwards
    pub fn controls_enabled(&self) -> bool {
        self.phase != SyncPhase::AwaitingFirstData
    }

    pub fn buffer(&self) -> &PredictionBuffer {
        &self.buffer
    }

    pub fn last_emitted(&self) -> Option<usize> {
        self.last_emitted
    }

    /// Feed one record from the stream into the buffer.
    ///
    /// Returns whether the record was kept (out-of-order deliveries are
    /// dropped by the buffer).
    pub fn ingest(&mut self, record: TelemetryRecord) -> bool {
        if !self.buffer.append(record) {
            return false;
        }
        match self.phase {
            SyncPhase::AwaitingFirstData => {
                debug!("first record ingested; playback enabled");
                self.phase = SyncPhase::Ready;
            }
            SyncPhase::Exhausted => {
                // Re-evaluate the stall on every append
                if let Some(expected) = self.raw_expected_index(self.last_time) {
                    if expected < self.buffer.len() {
                        debug!(expected, "buffer caught up; leaving exhausted state");
                        self.phase = SyncPhase::Ready;
                    }
                }
            }
            _ => {}
        }
        true
    }

    /// The backend finished producing; the buffer will not grow further.
    pub fn on_stream_complete(&mut self) {
        self.stream_complete = true;
        if self.phase == SyncPhase::Exhausted {
            self.phase = SyncPhase::Ready;
        }
    }

    /// Explicit play request. Honored only when there is something to show
    /// at or after the current cursor.
    pub fn request_play(&mut self) {
        match self.phase {
            SyncPhase::Ready | SyncPhase::Paused => {
                let cursor = self.last_emitted.unwrap_or(0);
                if self.buffer.len() > cursor {
                    self.media.play();
                    self.phase = SyncPhase::Playing;
                }
            }
            _ => {}
        }
    }

    /// Explicit pause request
    pub fn request_pause(&mut self) {
        if self.phase == SyncPhase::Playing {
            self.media.pause();
            self.phase = SyncPhase::Paused;
        }
    }

    /// The media element reached its natural end
    pub fn on_ended(&mut self) {
        if self.phase == SyncPhase::Playing {
            self.phase = SyncPhase::Paused;
        }
    }

    /// A media time-update tick. Emits the current record when the cursor
    /// moved forward to a new index; pauses playback when the expected
    /// index has outrun ingestion.
    pub fn on_time_update(&mut self, t: Seconds) {
        self.last_time = t;
        if self.buffer.is_empty() {
            return;
        }

        let expected = match self.raw_expected_index(t) {
            Some(idx) => idx,
            None => return,
        };

        let expected = if expected >= self.buffer.len() {
            if self.stream_complete {
                // Nothing more is coming; hold the last record
                self.buffer.len() - 1
            } else {
                if self.phase == SyncPhase::Playing {
                    debug!(
                        expected,
                        available = self.buffer.len(),
                        "playback outran ingestion; pausing"
                    );
                    self.media.pause();
                    self.phase = SyncPhase::Exhausted;
                }
                return;
            }
        } else {
            expected
        };

        // At most one emission per index, and never backward
        if let Some(prev) = self.last_emitted {
            if expected <= prev {
                return;
            }
        }
        self.last_emitted = Some(expected);
        if let Some(record) = self.buffer.get(expected) {
            (self.on_record)(record);
        }
    }

    fn raw_expected_index(&self, t: Seconds) -> Option<usize> {
        match self.strategy {
            LookupStrategy::FixedCadence(cadence) => Some(cadence.expected_index(t)),
            LookupStrategy::Timestamped => self.buffer.index_at_time(t),
        }
    }
}
