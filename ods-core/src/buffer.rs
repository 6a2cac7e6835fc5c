//! Append-only, time-ordered store of telemetry records
//!
//! One buffer belongs to one session. There is no deletion; a session reset
//! discards the whole instance.

use crate::model::TelemetryRecord;
use crate::units::Seconds;
use tracing::debug;

/// Ordered accumulation of telemetry records with point lookup
#[derive(Debug, Default)]
pub struct PredictionBuffer {
    records: Vec<TelemetryRecord>,
}

impl PredictionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record in arrival order.
    ///
    /// A record whose `sequence_index` is not greater than the last appended
    /// one is silently dropped (duplicate or out-of-order delivery). Returns
    /// whether the record was kept.
    pub fn append(&mut self, record: TelemetryRecord) -> bool {
        if let Some(last) = self.records.last() {
            if record.sequence_index <= last.sequence_index {
                debug!(
                    sequence_index = record.sequence_index,
                    last = last.sequence_index,
                    "dropping out-of-order record"
                );
                return false;
            }
        }
        self.records.push(record);
        true
    }

    /// Index of the last record with `elapsed_time <= t`.
    ///
    /// When several records share a timestamp the most recently appended one
    /// wins. None when the buffer is empty or `t` precedes the first record.
    pub fn index_at_time(&self, t: Seconds) -> Option<usize> {
        let count = self
            .records
            .partition_point(|r| r.elapsed_time.0 <= t.0);
        count.checked_sub(1)
    }

    /// The record considered current at media time `t`
    pub fn find_at_time(&self, t: Seconds) -> Option<&TelemetryRecord> {
        self.index_at_time(t).map(|i| &self.records[i])
    }

    /// Lookup for frame-grouped predictions: the record covering the group
    /// that `frame_index` falls into, i.e. whose own frame index equals
    /// `floor(frame_index / group_size) * group_size`.
    pub fn find_by_frame_group(
        &self,
        frame_index: u64,
        group_size: u64,
    ) -> Option<&TelemetryRecord> {
        if group_size == 0 {
            return None;
        }
        let bucket = frame_index / group_size * group_size;
        self.records
            .iter()
            .rev()
            .find(|r| r.frame_index() == Some(bucket))
    }

    pub fn get(&self, index: usize) -> Option<&TelemetryRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&TelemetryRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfidenceInterval, SpeedPrediction, SteeringPrediction, TelemetryPayload};
    use crate::units::{Degrees, KilometersPerHour};

    fn steering_record(seq: u64, t: f64, angle: f32) -> TelemetryRecord {
        TelemetryRecord {
            sequence_index: seq,
            elapsed_time: Seconds(t),
            payload: TelemetryPayload::Steering(SteeringPrediction {
                predicted_angle: Degrees(angle),
                ground_truth_angle: None,
            }),
        }
    }

    fn speed_record(seq: u64, t: f64, frame: u64) -> TelemetryRecord {
        TelemetryRecord {
            sequence_index: seq,
            elapsed_time: Seconds(t),
            payload: TelemetryPayload::Speed(SpeedPrediction {
                velocity: KilometersPerHour::new(30.0),
                ground_truth_velocity: None,
                confidence: ConfidenceInterval::new(
                    KilometersPerHour::new(28.0),
                    KilometersPerHour::new(32.0),
                ),
                iqr: KilometersPerHour::new(1.5),
                frame_index: frame,
            }),
        }
    }

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut buf = PredictionBuffer::new();
        assert!(buf.append(steering_record(0, 0.0, 1.0)));
        assert!(buf.append(steering_record(1, 0.033, 2.0)));
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.last().unwrap().sequence_index, 1);
    }

    #[test]
    fn test_append_rejects_duplicate_index() {
        let mut buf = PredictionBuffer::new();
        buf.append(steering_record(0, 0.0, 1.0));
        buf.append(steering_record(1, 0.033, 2.0));

        // Re-delivery of an already-seen record is a no-op
        assert!(!buf.append(steering_record(0, 0.0, 1.0)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_append_rejects_stale_index() {
        let mut buf = PredictionBuffer::new();
        buf.append(steering_record(5, 0.0, 1.0));
        assert!(!buf.append(steering_record(3, 0.1, 2.0)));
        assert!(buf.append(steering_record(6, 0.2, 3.0)));
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_find_at_time_basic() {
        let mut buf = PredictionBuffer::new();
        buf.append(steering_record(0, 0.0, 1.0));
        buf.append(steering_record(1, 1.0, 2.0));
        buf.append(steering_record(2, 2.0, 3.0));

        assert_eq!(buf.find_at_time(Seconds(0.5)).unwrap().sequence_index, 0);
        assert_eq!(buf.find_at_time(Seconds(1.0)).unwrap().sequence_index, 1);
        assert_eq!(buf.find_at_time(Seconds(9.0)).unwrap().sequence_index, 2);
    }

    #[test]
    fn test_find_at_time_empty_or_before_first() {
        let mut buf = PredictionBuffer::new();
        assert!(buf.find_at_time(Seconds(0.0)).is_none());

        buf.append(steering_record(0, 1.0, 1.0));
        assert!(buf.find_at_time(Seconds(0.5)).is_none());
    }

    #[test]
    fn test_find_at_time_tie_break_latest_appended() {
        let mut buf = PredictionBuffer::new();
        buf.append(steering_record(0, 1.0, 1.0));
        buf.append(steering_record(1, 1.0, 2.0));
        buf.append(steering_record(2, 1.0, 3.0));

        // All three share a timestamp; the most recently appended wins
        assert_eq!(buf.find_at_time(Seconds(1.0)).unwrap().sequence_index, 2);
    }

    #[test]
    fn test_find_by_frame_group() {
        let mut buf = PredictionBuffer::new();
        buf.append(speed_record(0, 0.0, 42));
        buf.append(speed_record(1, 0.1, 45));
        buf.append(speed_record(2, 0.2, 48));

        // Frame 47 falls into the bucket starting at 45
        let hit = buf.find_by_frame_group(47, 3).unwrap();
        assert_eq!(hit.frame_index(), Some(45));

        let hit = buf.find_by_frame_group(48, 3).unwrap();
        assert_eq!(hit.frame_index(), Some(48));
    }

    #[test]
    fn test_find_by_frame_group_no_match() {
        let mut buf = PredictionBuffer::new();
        buf.append(speed_record(0, 0.0, 0));
        assert!(buf.find_by_frame_group(99, 3).is_none());
        assert!(buf.find_by_frame_group(0, 0).is_none());
    }

    #[test]
    fn test_find_by_frame_group_ignores_timestamp_records() {
        let mut buf = PredictionBuffer::new();
        buf.append(steering_record(0, 0.0, 1.0));
        assert!(buf.find_by_frame_group(0, 3).is_none());
    }
}
