//! Synthetic prediction engine
//!
//! Stands in for the external inference service: generates a plausible
//! steering/speed trace for any video id without a model or GPU. The trace
//! is deterministic per id, so cache checks and repeat runs line up.
//!
//! Emission framing matches the live backend: every run opens with an
//! `initialized` frame (carrying the first prediction for the speed demo),
//! streams its data frames, and closes with `complete`.

use ods_core::model::{
    ConfidenceInterval, DemoKind, RawMessage, SpeedPrediction, SteeringPrediction,
    TelemetryPayload, TelemetryRecord,
};
use ods_core::units::{Degrees, KilometersPerHour, Seconds};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Cadence of the demo clips: 601 frames over 20 seconds
pub const TOTAL_FRAMES: u64 = 601;
pub const CLIP_DURATION_SECS: f64 = 20.0;

/// Speed predictions cover groups of this many frames
pub const PREDICTION_GROUP: u64 = 3;

/// One generated run: the wire frames to stream and the equivalent typed
/// records to keep in the prediction cache.
pub struct GeneratedRun {
    pub messages: Vec<RawMessage>,
    pub records: Vec<TelemetryRecord>,
}

/// Produces prediction runs for clips and single-shot image evaluations
pub trait PredictionEngine: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, video_id: &str, kind: DemoKind) -> GeneratedRun;

    fn evaluate_image(&self, image_id: &str) -> TelemetryRecord;
}

/// Deterministic trace generator seeded from the media id
pub struct SyntheticEngine;

impl SyntheticEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SyntheticEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn frame_duration() -> f64 {
    CLIP_DURATION_SECS / TOTAL_FRAMES as f64
}

fn push_data(
    messages: &mut Vec<RawMessage>,
    records: &mut Vec<TelemetryRecord>,
    payload: TelemetryPayload,
    elapsed: Seconds,
    first: bool,
) {
    let message = if first {
        RawMessage::initialized(&payload, elapsed)
    } else {
        RawMessage::streaming(&payload, elapsed)
    };
    messages.push(message);
    records.push(TelemetryRecord {
        sequence_index: records.len() as u64,
        elapsed_time: elapsed,
        payload,
    });
}

/// Phase offsets derived from the id keep distinct clips visibly different
fn seed_phases(id: &str) -> (f32, f32) {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let seed = hasher.finish();
    let phase_a = (seed % 628) as f32 / 100.0;
    let phase_b = ((seed >> 8) % 628) as f32 / 100.0;
    (phase_a, phase_b)
}

fn steering_at(t: f32, phase_a: f32, phase_b: f32) -> SteeringPrediction {
    let angle = 28.0 * (0.4 * t + phase_a).sin() + 6.0 * (1.9 * t + phase_b).sin();
    let ground_truth = angle + 1.5 * (2.3 * t + phase_a).sin();
    SteeringPrediction {
        predicted_angle: Degrees(angle),
        ground_truth_angle: Some(Degrees(ground_truth)),
    }
}

fn speed_at(t: f32, frame_index: u64, phase_a: f32, phase_b: f32) -> SpeedPrediction {
    let speed = 52.0 + 18.0 * (0.25 * t + phase_b).sin() + 4.0 * (0.9 * t).sin();
    let ground_truth = speed + 2.0 * (3.0 * t + phase_a).sin();
    let half_width = 3.5 + 1.2 * (0.8 * t + phase_a).sin();
    SpeedPrediction {
        velocity: KilometersPerHour::new(speed),
        ground_truth_velocity: Some(KilometersPerHour::new(ground_truth)),
        confidence: ConfidenceInterval::new(
            KilometersPerHour::new(speed - half_width),
            KilometersPerHour::new(speed + half_width),
        ),
        iqr: KilometersPerHour::new(half_width * 1.1),
        frame_index,
    }
}

impl PredictionEngine for SyntheticEngine {
    fn name(&self) -> &str {
        "Synthetic"
    }

    fn generate(&self, video_id: &str, kind: DemoKind) -> GeneratedRun {
        let (phase_a, phase_b) = seed_phases(video_id);
        let dt = frame_duration();

        let mut messages = Vec::new();
        let mut records = Vec::new();

        match kind {
            DemoKind::Steering => {
                messages.push(RawMessage {
                    status: "initialized".to_string(),
                    ..Default::default()
                });
                for frame in 0..TOTAL_FRAMES {
                    let elapsed = Seconds(frame as f64 * dt);
                    let t = elapsed.0 as f32;
                    push_data(
                        &mut messages,
                        &mut records,
                        TelemetryPayload::Steering(steering_at(t, phase_a, phase_b)),
                        elapsed,
                        false,
                    );
                }
            }
            DemoKind::Speed => {
                // One prediction per frame group; the first doubles as the
                // initialized acknowledgement
                for frame in (0..TOTAL_FRAMES).step_by(PREDICTION_GROUP as usize) {
                    let elapsed = Seconds(frame as f64 * dt);
                    let t = elapsed.0 as f32;
                    push_data(
                        &mut messages,
                        &mut records,
                        TelemetryPayload::Speed(speed_at(t, frame, phase_a, phase_b)),
                        elapsed,
                        frame == 0,
                    );
                }
            }
            DemoKind::Combined => {
                messages.push(RawMessage {
                    status: "initialized".to_string(),
                    ..Default::default()
                });
                for frame in 0..TOTAL_FRAMES {
                    let elapsed = Seconds(frame as f64 * dt);
                    let t = elapsed.0 as f32;
                    push_data(
                        &mut messages,
                        &mut records,
                        TelemetryPayload::Combined {
                            steering: steering_at(t, phase_a, phase_b),
                            speed: speed_at(t, frame, phase_a, phase_b),
                        },
                        elapsed,
                        false,
                    );
                }
            }
        }

        messages.push(RawMessage::complete());
        GeneratedRun { messages, records }
    }

    fn evaluate_image(&self, image_id: &str) -> TelemetryRecord {
        let (phase_a, phase_b) = seed_phases(image_id);
        TelemetryRecord {
            sequence_index: 0,
            elapsed_time: Seconds(0.0),
            payload: TelemetryPayload::Steering(steering_at(0.0, phase_a, phase_b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic_per_id() {
        let engine = SyntheticEngine::new();
        let a = engine.generate("clip-a", DemoKind::Steering);
        let b = engine.generate("clip-a", DemoKind::Steering);
        assert_eq!(a.records, b.records);

        let c = engine.generate("clip-b", DemoKind::Steering);
        assert_ne!(a.records, c.records, "different ids should differ");
    }

    #[test]
    fn test_steering_run_framing() {
        let run = SyntheticEngine::new().generate("clip-a", DemoKind::Steering);

        assert_eq!(run.messages.first().unwrap().status, "initialized");
        assert_eq!(run.messages.last().unwrap().status, "complete");
        // initialized + one frame per streaming message + complete
        assert_eq!(run.messages.len() as u64, TOTAL_FRAMES + 2);
        assert_eq!(run.records.len() as u64, TOTAL_FRAMES);

        // Bare acknowledgement, no payload
        assert!(run.messages[0].predicted_angle.is_none());
        assert!(run.messages[1].predicted_angle.is_some());
    }

    #[test]
    fn test_speed_run_groups_frames() {
        let run = SyntheticEngine::new().generate("clip-a", DemoKind::Speed);

        // Frames 0, 3, 6, ..., 600
        let expected = (TOTAL_FRAMES + PREDICTION_GROUP - 1) / PREDICTION_GROUP;
        assert_eq!(run.records.len() as u64, expected);

        // The first prediction rides on the initialized frame
        assert_eq!(run.messages[0].status, "initialized");
        assert_eq!(run.messages[0].frame_count, Some(0));
        assert!(run.messages[0].velocity_kmh.is_some());
        assert_eq!(run.messages[1].status, "streaming");
        assert_eq!(run.messages[1].frame_count, Some(3));

        for record in &run.records {
            assert_eq!(record.frame_index().unwrap() % PREDICTION_GROUP, 0);
        }
    }

    #[test]
    fn test_combined_run_carries_both_payloads() {
        let run = SyntheticEngine::new().generate("clip-a", DemoKind::Combined);
        assert_eq!(run.records.len() as u64, TOTAL_FRAMES);

        let data = &run.messages[1];
        assert!(data.predicted_angle.is_some());
        assert!(data.velocity_kmh.is_some());
        assert!(data.frame_count.is_some());
    }

    #[test]
    fn test_generated_values_are_sane() {
        let run = SyntheticEngine::new().generate("clip-a", DemoKind::Speed);
        for record in &run.records {
            match &record.payload {
                TelemetryPayload::Speed(speed) => {
                    assert!(speed.velocity.0 >= 0.0, "speed must be non-negative");
                    assert!(
                        speed.confidence.lower().0 <= speed.confidence.upper().0,
                        "confidence bounds must be ordered"
                    );
                }
                other => panic!("expected speed payload, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_records_align_with_messages() {
        let engine = SyntheticEngine::new();
        let run = engine.generate("clip-a", DemoKind::Steering);

        // Every data message has a matching record at the same timestamp
        let data_messages: Vec<_> = run
            .messages
            .iter()
            .filter(|m| m.predicted_angle.is_some())
            .collect();
        assert_eq!(data_messages.len(), run.records.len());
        for (message, record) in data_messages.iter().zip(&run.records) {
            assert_eq!(message.timestamp, Some(record.elapsed_time.0));
        }
    }

    #[test]
    fn test_sequence_indices_are_contiguous() {
        let run = SyntheticEngine::new().generate("clip-a", DemoKind::Combined);
        for (i, record) in run.records.iter().enumerate() {
            assert_eq!(record.sequence_index, i as u64);
        }
    }

    #[test]
    fn test_evaluate_image_single_record() {
        let record = SyntheticEngine::new().evaluate_image("still-a");
        assert_eq!(record.sequence_index, 0);
        assert_eq!(record.elapsed_time, Seconds(0.0));
        assert!(matches!(record.payload, TelemetryPayload::Steering(_)));
    }
}
