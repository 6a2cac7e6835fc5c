//! Inbound stream classification
//!
//! Adapts the raw text frames of one transport into typed lifecycle events.
//! Malformed frames are dropped here with a warning; the stream continues.
//! Unrecognized statuses are ignored without ending the stream, so a newer
//! backend can add statuses without breaking older clients.

use ods_core::error::SessionError;
use ods_core::model::{DemoKind, RawMessage, TelemetryRecord};
use ods_core::sync::FrameCadence;
use ods_core::units::Seconds;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A classified lifecycle event from the prediction stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Backend acknowledged the session. The speed demo already carries its
    /// first prediction here.
    Initialized(Option<TelemetryRecord>),
    Data(TelemetryRecord),
    Complete,
    Error(String),
    /// Unrecognized status, a no-op
    Ignored,
}

/// Wraps one inbound message channel and yields classified events in
/// arrival order. Sequence indices are assigned here, on arrival.
pub struct TelemetryStream {
    inbound: mpsc::Receiver<String>,
    kind: DemoKind,
    frame_duration: Option<f64>,
    next_sequence: u64,
}

impl TelemetryStream {
    pub fn new(
        inbound: mpsc::Receiver<String>,
        kind: DemoKind,
        cadence: Option<FrameCadence>,
    ) -> Self {
        Self {
            inbound,
            kind,
            frame_duration: cadence.map(|c| c.frame_duration()),
            next_sequence: 0,
        }
    }

    /// Next event worth acting on. Malformed and unrecognized frames are
    /// consumed here. None once the transport closes.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let raw = self.inbound.recv().await?;
            match self.classify(&raw) {
                Ok(StreamEvent::Ignored) => continue,
                Ok(event) => return Some(event),
                Err(error) => {
                    warn!(%error, "dropping malformed stream frame");
                    continue;
                }
            }
        }
    }

    /// Classify one raw frame
    pub fn classify(&mut self, raw: &str) -> Result<StreamEvent, SessionError> {
        let msg: RawMessage =
            serde_json::from_str(raw).map_err(|e| SessionError::MalformedMessage {
                reason: e.to_string(),
            })?;

        match msg.status.as_str() {
            "streaming" => {
                let record = self
                    .record_from(&msg)
                    .ok_or_else(|| SessionError::MalformedMessage {
                        reason: format!("streaming frame missing {:?} fields", self.kind),
                    })?;
                Ok(StreamEvent::Data(record))
            }
            "initialized" => Ok(StreamEvent::Initialized(self.record_from(&msg))),
            "complete" => Ok(StreamEvent::Complete),
            "error" => Ok(StreamEvent::Error(
                msg.message
                    .unwrap_or_else(|| "unspecified stream error".to_string()),
            )),
            other => {
                debug!(status = other, "ignoring unrecognized status");
                Ok(StreamEvent::Ignored)
            }
        }
    }

    /// Build a typed record, assigning the next arrival sequence index.
    ///
    /// Frame-grouped payloads derive their media time from the frame index
    /// when the cadence is known; everything else requires a timestamp.
    fn record_from(&mut self, msg: &RawMessage) -> Option<TelemetryRecord> {
        let payload = msg.payload_for(self.kind)?;
        let elapsed = match (msg.frame_count, self.frame_duration) {
            (Some(frame), Some(duration)) => Seconds(frame as f64 * duration),
            _ => Seconds(msg.timestamp?),
        };
        let record = TelemetryRecord {
            sequence_index: self.next_sequence,
            elapsed_time: elapsed,
            payload,
        };
        self.next_sequence += 1;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ods_core::model::TelemetryPayload;

    fn steering_stream() -> TelemetryStream {
        let (_tx, rx) = mpsc::channel(8);
        TelemetryStream::new(rx, DemoKind::Steering, None)
    }

    fn speed_stream() -> TelemetryStream {
        let (_tx, rx) = mpsc::channel(8);
        TelemetryStream::new(
            rx,
            DemoKind::Speed,
            Some(FrameCadence::new(Seconds(20.0), 601)),
        )
    }

    #[test]
    fn test_classify_streaming_steering() {
        let mut stream = steering_stream();
        let event = stream
            .classify(r#"{"status":"streaming","predicted_angle":-3.5,"timestamp":0.6}"#)
            .unwrap();

        match event {
            StreamEvent::Data(record) => {
                assert_eq!(record.sequence_index, 0);
                assert_eq!(record.elapsed_time, Seconds(0.6));
                assert!(matches!(record.payload, TelemetryPayload::Steering(_)));
            }
            other => panic!("expected Data, got {:?}", other),
        }
    }

    #[test]
    fn test_sequence_indices_follow_arrival_order() {
        let mut stream = steering_stream();
        for i in 0..3 {
            let raw = format!(
                r#"{{"status":"streaming","predicted_angle":1.0,"timestamp":{}}}"#,
                i as f64 * 0.1
            );
            match stream.classify(&raw).unwrap() {
                StreamEvent::Data(record) => assert_eq!(record.sequence_index, i),
                other => panic!("expected Data, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_classify_speed_derives_time_from_frame_group() {
        let mut stream = speed_stream();
        let raw = r#"{"status":"streaming","velocity_kmh":42.0,"confidence_lower_kmh":38.0,"confidence_upper_kmh":46.0,"iqr_kmh":3.0,"frame_count":45,"timestamp":99.0}"#;

        match stream.classify(raw).unwrap() {
            StreamEvent::Data(record) => {
                // Frame index wins over the wire timestamp
                let expected = 45.0 * (20.0 / 601.0);
                assert!((record.elapsed_time.0 - expected).abs() < 1e-9);
                assert_eq!(record.frame_index(), Some(45));
            }
            other => panic!("expected Data, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_initialized_with_and_without_payload() {
        let mut stream = speed_stream();
        let with_payload = r#"{"status":"initialized","velocity_kmh":10.0,"confidence_lower_kmh":8.0,"confidence_upper_kmh":12.0,"iqr_kmh":1.0,"frame_count":0}"#;
        assert!(matches!(
            stream.classify(with_payload).unwrap(),
            StreamEvent::Initialized(Some(_))
        ));

        let mut stream = steering_stream();
        assert!(matches!(
            stream.classify(r#"{"status":"initialized"}"#).unwrap(),
            StreamEvent::Initialized(None)
        ));
    }

    #[test]
    fn test_classify_complete_and_error() {
        let mut stream = steering_stream();
        assert_eq!(
            stream.classify(r#"{"status":"complete"}"#).unwrap(),
            StreamEvent::Complete
        );
        assert_eq!(
            stream
                .classify(r#"{"status":"error","message":"gpu fell over"}"#)
                .unwrap(),
            StreamEvent::Error("gpu fell over".to_string())
        );
        assert_eq!(
            stream.classify(r#"{"status":"error"}"#).unwrap(),
            StreamEvent::Error("unspecified stream error".to_string())
        );
    }

    #[test]
    fn test_classify_unknown_status_is_ignored() {
        let mut stream = steering_stream();
        assert_eq!(
            stream.classify(r#"{"status":"analyzing"}"#).unwrap(),
            StreamEvent::Ignored
        );
    }

    #[test]
    fn test_classify_malformed_frame_is_error_not_panic() {
        let mut stream = steering_stream();
        assert!(matches!(
            stream.classify("not json at all"),
            Err(SessionError::MalformedMessage { .. })
        ));
        // Parseable JSON missing required fields is malformed too
        assert!(matches!(
            stream.classify(r#"{"status":"streaming","timestamp":1.0}"#),
            Err(SessionError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn test_malformed_frame_does_not_consume_sequence_index() {
        let mut stream = steering_stream();
        let _ = stream.classify("not json");
        let _ = stream.classify(r#"{"status":"streaming","timestamp":1.0}"#);

        match stream
            .classify(r#"{"status":"streaming","predicted_angle":1.0,"timestamp":0.0}"#)
            .unwrap()
        {
            StreamEvent::Data(record) => assert_eq!(record.sequence_index, 0),
            other => panic!("expected Data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_next_event_skips_garbage_and_ends_on_close() {
        let (tx, rx) = mpsc::channel(8);
        let mut stream = TelemetryStream::new(rx, DemoKind::Steering, None);

        tx.send("garbage".to_string()).await.unwrap();
        tx.send(r#"{"status":"analyzing"}"#.to_string()).await.unwrap();
        tx.send(r#"{"status":"streaming","predicted_angle":2.0,"timestamp":0.1}"#.to_string())
            .await
            .unwrap();
        drop(tx);

        assert!(matches!(
            stream.next_event().await,
            Some(StreamEvent::Data(_))
        ));
        assert!(stream.next_event().await.is_none());
    }
}
