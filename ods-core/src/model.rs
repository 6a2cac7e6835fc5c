//! Telemetry data model and wire protocol
//!
//! One [`TelemetryRecord`] is one inference result tied to a point in media
//! time. The payload is a tagged union per demo kind so that a record can
//! never carry a half-filled mix of steering and speed fields.
//!
//! Wire messages ([`RawMessage`]) are deliberately loose: every field is
//! optional and the `status` discriminator is a plain string, because the
//! backend may emit statuses this client does not know about. Typing happens
//! at classification time, not at parse time.

use crate::units::{Degrees, KilometersPerHour, Seconds};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which demo a session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoKind {
    Steering,
    Speed,
    Combined,
}

impl FromStr for DemoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steering" => Ok(DemoKind::Steering),
            "speed" => Ok(DemoKind::Speed),
            "combined" => Ok(DemoKind::Combined),
            other => Err(format!("unknown demo kind: {other}")),
        }
    }
}

/// One steering inference result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringPrediction {
    pub predicted_angle: Degrees,
    pub ground_truth_angle: Option<Degrees>,
}

/// Closed interval around a speed prediction, lower <= upper
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    lower: KilometersPerHour,
    upper: KilometersPerHour,
}

impl ConfidenceInterval {
    /// Build an interval, swapping the bounds if they arrive inverted
    pub fn new(lower: KilometersPerHour, upper: KilometersPerHour) -> Self {
        if lower.0 <= upper.0 {
            Self { lower, upper }
        } else {
            Self {
                lower: upper,
                upper: lower,
            }
        }
    }

    pub fn lower(&self) -> KilometersPerHour {
        self.lower
    }

    pub fn upper(&self) -> KilometersPerHour {
        self.upper
    }

    /// Half the interval width, the +/- shown next to a speed readout
    pub fn half_width(&self) -> f32 {
        (self.upper.0 - self.lower.0) / 2.0
    }
}

/// One speed inference result
///
/// Speed predictions are emitted per frame group rather than per frame;
/// `frame_index` is the first frame of the group this prediction covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedPrediction {
    pub velocity: KilometersPerHour,
    pub ground_truth_velocity: Option<KilometersPerHour>,
    pub confidence: ConfidenceInterval,
    pub iqr: KilometersPerHour,
    pub frame_index: u64,
}

/// Demo-kind-specific payload of a telemetry record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TelemetryPayload {
    Steering(SteeringPrediction),
    Speed(SpeedPrediction),
    Combined {
        steering: SteeringPrediction,
        speed: SpeedPrediction,
    },
}

impl TelemetryPayload {
    pub fn kind(&self) -> DemoKind {
        match self {
            TelemetryPayload::Steering(_) => DemoKind::Steering,
            TelemetryPayload::Speed(_) => DemoKind::Speed,
            TelemetryPayload::Combined { .. } => DemoKind::Combined,
        }
    }
}

/// One inference result for one media instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Monotonically increasing arrival order within a session
    pub sequence_index: u64,
    /// Media time this record corresponds to
    pub elapsed_time: Seconds,
    pub payload: TelemetryPayload,
}

impl TelemetryRecord {
    pub fn kind(&self) -> DemoKind {
        self.payload.kind()
    }

    /// Frame index for frame-grouped payloads, None for timestamp-only ones
    pub fn frame_index(&self) -> Option<u64> {
        match &self.payload {
            TelemetryPayload::Steering(_) => None,
            TelemetryPayload::Speed(speed) => Some(speed.frame_index),
            TelemetryPayload::Combined { speed, .. } => Some(speed.frame_index),
        }
    }
}

// === Wire protocol ===

/// Inbound stream frame as it appears on the socket
///
/// Also used outbound by the server, which is why the constructors live
/// here rather than in the server crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_angle: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth_angle: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_kmh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_truth_velocity_kmh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_lower_kmh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_upper_kmh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iqr_kmh: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,
}

impl RawMessage {
    pub fn complete() -> Self {
        Self {
            status: "complete".to_string(),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn streaming(payload: &TelemetryPayload, timestamp: Seconds) -> Self {
        Self::with_payload("streaming", payload, timestamp)
    }

    /// First frame of a session; for the speed demo it already carries data
    pub fn initialized(payload: &TelemetryPayload, timestamp: Seconds) -> Self {
        Self::with_payload("initialized", payload, timestamp)
    }

    fn with_payload(status: &str, payload: &TelemetryPayload, timestamp: Seconds) -> Self {
        let mut msg = Self {
            status: status.to_string(),
            timestamp: Some(timestamp.0),
            ..Default::default()
        };
        match payload {
            TelemetryPayload::Steering(s) => msg.fill_steering(s),
            TelemetryPayload::Speed(v) => msg.fill_speed(v),
            TelemetryPayload::Combined { steering, speed } => {
                msg.fill_steering(steering);
                msg.fill_speed(speed);
            }
        }
        msg
    }

    fn fill_steering(&mut self, s: &SteeringPrediction) {
        self.predicted_angle = Some(s.predicted_angle.0);
        self.ground_truth_angle = s.ground_truth_angle.map(|a| a.0);
    }

    fn fill_speed(&mut self, v: &SpeedPrediction) {
        self.velocity_kmh = Some(v.velocity.0);
        self.ground_truth_velocity_kmh = v.ground_truth_velocity.map(|g| g.0);
        self.confidence_lower_kmh = Some(v.confidence.lower().0);
        self.confidence_upper_kmh = Some(v.confidence.upper().0);
        self.iqr_kmh = Some(v.iqr.0);
        self.frame_count = Some(v.frame_index);
    }

    /// Extract the typed payload for the demo kind this session is running.
    ///
    /// Returns None when a required field for the kind is missing; the
    /// caller treats that as a malformed frame.
    pub fn payload_for(&self, kind: DemoKind) -> Option<TelemetryPayload> {
        match kind {
            DemoKind::Steering => self.steering_payload().map(TelemetryPayload::Steering),
            DemoKind::Speed => self.speed_payload().map(TelemetryPayload::Speed),
            DemoKind::Combined => {
                let steering = self.steering_payload()?;
                let speed = self.speed_payload()?;
                Some(TelemetryPayload::Combined { steering, speed })
            }
        }
    }

    fn steering_payload(&self) -> Option<SteeringPrediction> {
        Some(SteeringPrediction {
            predicted_angle: Degrees(self.predicted_angle?),
            ground_truth_angle: self.ground_truth_angle.map(Degrees),
        })
    }

    fn speed_payload(&self) -> Option<SpeedPrediction> {
        Some(SpeedPrediction {
            velocity: KilometersPerHour::new(self.velocity_kmh?),
            ground_truth_velocity: self
                .ground_truth_velocity_kmh
                .map(KilometersPerHour::new),
            confidence: ConfidenceInterval::new(
                KilometersPerHour::new(self.confidence_lower_kmh?),
                KilometersPerHour::new(self.confidence_upper_kmh?),
            ),
            iqr: KilometersPerHour::new(self.iqr_kmh?),
            frame_index: self.frame_count?,
        })
    }
}

/// Sent once by the client immediately after the transport opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub video_id: String,
}
