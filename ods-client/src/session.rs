//! Demo session lifecycle and orchestration
//!
//! One [`DemoSession`] owns one transport, one prediction buffer (inside
//! the synchronizer), and one worker task for its whole lifetime. Stopping
//! a session cancels and joins the worker, so no event from a stale
//! session can reach a torn-down synchronizer. The controller on top
//! guarantees at most one active session at a time.

use crate::stream::{StreamEvent, TelemetryStream};
use crate::transport::Connector;
use ods_core::error::SessionError;
use ods_core::model::{DemoKind, StartRequest, TelemetryRecord};
use ods_core::sync::{LookupStrategy, MediaControl, PlaybackSynchronizer};
use ods_core::units::Seconds;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RECORD_FANOUT_DEPTH: usize = 256;
const MEDIA_EVENT_DEPTH: usize = 64;

/// Lifecycle of one streaming or cached-replay run.
///
/// Transitions are one-directional; Complete and Error are terminal for
/// the session (a new run builds a fresh session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Streaming,
    Complete,
    Error(String),
}

/// Media-side events flowing into the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    TimeUpdate(Seconds),
    Ended,
    PlayRequested,
    PauseRequested,
}

/// Per-demo-kind session parameters
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub kind: DemoKind,
    pub strategy: LookupStrategy,
}

impl SessionConfig {
    fn cadence(&self) -> Option<ods_core::sync::FrameCadence> {
        match self.strategy {
            LookupStrategy::FixedCadence(cadence) => Some(cadence),
            LookupStrategy::Timestamped => None,
        }
    }
}

/// Handle to one running demo session
pub struct DemoSession {
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
    phase_rx: watch::Receiver<SessionPhase>,
    media_tx: mpsc::Sender<MediaEvent>,
    records_tx: broadcast::Sender<TelemetryRecord>,
}

impl DemoSession {
    /// Open the transport, send the initiation request, and spawn the
    /// session worker. Fails with a connection error if the transport
    /// cannot be established.
    pub async fn start(
        connector: &dyn Connector,
        video_id: &str,
        config: SessionConfig,
        media: Box<dyn MediaControl>,
    ) -> Result<DemoSession, SessionError> {
        info!(video_id, kind = ?config.kind, "starting demo session");
        let transport = connector.connect().await?;

        // Single initiation message, immediately after the transport opens
        let request = serde_json::to_string(&StartRequest {
            video_id: video_id.to_string(),
        })
        .map_err(|e| SessionError::Connection(format!("encoding start request: {e}")))?;
        transport.send(request).await?;

        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Connecting);
        let phase_tx = Arc::new(phase_tx);
        let (records_tx, _) = broadcast::channel(RECORD_FANOUT_DEPTH);
        let (media_tx, media_rx) = mpsc::channel(MEDIA_EVENT_DEPTH);
        let cancel = CancellationToken::new();

        let stream = TelemetryStream::new(transport.inbound, config.kind, config.cadence());
        let fanout = records_tx.clone();
        let sync = PlaybackSynchronizer::new(
            config.strategy,
            media,
            Box::new(move |record| {
                // Nobody listening is fine; they will catch the next one
                let _ = fanout.send(*record);
            }),
        );

        let worker = tokio::spawn(run_worker(
            stream,
            sync,
            media_rx,
            phase_tx.clone(),
            cancel.clone(),
            transport.outbound,
        ));

        Ok(DemoSession {
            cancel,
            worker: Some(worker),
            phase_tx,
            phase_rx,
            media_tx,
            records_tx,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase_rx.borrow().clone()
    }

    /// Watch lifecycle transitions
    pub fn phase_watch(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }

    /// Subscribe to emitted current records. Dropping the receiver detaches
    /// the listener.
    pub fn subscribe_records(&self) -> broadcast::Receiver<TelemetryRecord> {
        self.records_tx.subscribe()
    }

    /// Sender for media-side events (time updates, play/pause, ended)
    pub fn media_events(&self) -> mpsc::Sender<MediaEvent> {
        self.media_tx.clone()
    }

    /// Tear the session down: close the transport and detach everything.
    ///
    /// Idempotent. After this returns, no further record is emitted even if
    /// the transport had queued messages.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if worker.await.is_err() {
                warn!("session worker panicked during teardown");
            }
            debug!("session worker stopped");
        }
        self.phase_tx.send_replace(SessionPhase::Idle);
    }
}

/// Per-demo-kind orchestration: owns at most one active session
pub struct DemoSessionController {
    connector: Arc<dyn Connector>,
    config: SessionConfig,
    active: Option<DemoSession>,
}

impl DemoSessionController {
    pub fn new(connector: Arc<dyn Connector>, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            active: None,
        }
    }

    /// Start a session for `video_id`. An already-active session is stopped
    /// first, so at most one transport is ever open per controller.
    pub async fn start(
        &mut self,
        video_id: &str,
        media: Box<dyn MediaControl>,
    ) -> Result<&DemoSession, SessionError> {
        self.stop().await;
        let session =
            DemoSession::start(self.connector.as_ref(), video_id, self.config, media).await?;
        Ok(self.active.insert(session))
    }

    /// Stop the active session, if any. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(mut session) = self.active.take() {
            session.stop().await;
        }
    }

    pub fn active(&self) -> Option<&DemoSession> {
        self.active.as_ref()
    }
}

/// The session event loop: one task per session, select over cancellation,
/// inbound stream frames, and media events.
async fn run_worker(
    mut stream: TelemetryStream,
    mut sync: PlaybackSynchronizer,
    mut media_rx: mpsc::Receiver<MediaEvent>,
    phase_tx: Arc<watch::Sender<SessionPhase>>,
    cancel: CancellationToken,
    _outbound: mpsc::Sender<String>,
) {
    let mut stream_open = true;
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("session cancelled");
                break;
            }

            event = media_rx.recv() => match event {
                Some(MediaEvent::TimeUpdate(t)) => sync.on_time_update(t),
                Some(MediaEvent::PlayRequested) => sync.request_play(),
                Some(MediaEvent::PauseRequested) => sync.request_pause(),
                Some(MediaEvent::Ended) => sync.on_ended(),
                None => break,
            },

            event = stream.next_event(), if stream_open => match event {
                Some(StreamEvent::Initialized(record)) => {
                    mark_streaming(&phase_tx);
                    if let Some(record) = record {
                        sync.ingest(record);
                    }
                }
                Some(StreamEvent::Data(record)) => {
                    mark_streaming(&phase_tx);
                    sync.ingest(record);
                }
                Some(StreamEvent::Complete) => {
                    info!("stream complete");
                    sync.on_stream_complete();
                    phase_tx.send_replace(SessionPhase::Complete);
                }
                Some(StreamEvent::Error(message)) => {
                    warn!(error = %message, "stream reported error; tearing down session");
                    phase_tx.send_replace(SessionPhase::Error(message));
                    break;
                }
                Some(StreamEvent::Ignored) => {}
                None => {
                    stream_open = false;
                    let complete = *phase_tx.borrow() == SessionPhase::Complete;
                    if complete {
                        // Normal close after completion; playback continues
                        // from the full buffer
                        debug!("transport closed after completion");
                    } else {
                        warn!("transport closed mid-stream");
                        phase_tx.send_replace(SessionPhase::Error(
                            "stream closed unexpectedly".to_string(),
                        ));
                        break;
                    }
                }
            },
        }
    }
}

fn mark_streaming(phase_tx: &watch::Sender<SessionPhase>) {
    phase_tx.send_if_modified(|phase| {
        if *phase == SessionPhase::Connecting {
            *phase = SessionPhase::Streaming;
            true
        } else {
            false
        }
    });
}
