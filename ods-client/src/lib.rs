//! OpenDriveSync Session Client
//!
//! Consumes a streaming prediction backend on behalf of a playback view:
//! opens one transport per demo run, classifies the inbound frames, and
//! drives the core playback synchronizer.

pub mod session;
pub mod stream;
pub mod transport;

pub use session::{DemoSession, DemoSessionController, MediaEvent, SessionConfig, SessionPhase};
pub use stream::{StreamEvent, TelemetryStream};
pub use transport::{Connector, StaticConnector, Transport};
