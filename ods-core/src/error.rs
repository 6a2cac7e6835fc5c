//! Session error taxonomy
//!
//! Transport- and session-level failures terminate the session; a malformed
//! single frame never does (it is logged and dropped where it is read).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// An inbound frame could not be parsed or was missing required fields.
    /// Recovered locally; the stream continues.
    #[error("malformed stream message: {reason}")]
    MalformedMessage { reason: String },

    /// The transport could not be established or failed afterwards.
    /// Terminates the session.
    #[error("stream connection failed: {0}")]
    Connection(String),

    /// The backend explicitly reported failure (`status: "error"`).
    /// Terminates the session; never retried automatically.
    #[error("stream reported error: {0}")]
    StreamReported(String),
}
