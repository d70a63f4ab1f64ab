//! Transport layer errors.

use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Name resolution or TCP connect failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// `send`/`recv` called before the handshake completed.
    #[error("Session not established")]
    NotEstablished,

    /// Payload does not fit in one record. The session stays usable.
    #[error("Payload of {len} bytes exceeds the record limit of {max}")]
    PayloadTooLarge {
        /// Payload size.
        len: usize,
        /// Largest plaintext a record carries.
        max: usize,
    },

    /// The session was closed, by the caller or after a fatal error.
    #[error("Session closed")]
    Closed,

    /// Protocol error from core.
    #[error("Protocol error: {0}")]
    Protocol(#[from] minitls_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
