//! Error types for protocol operations.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Protocol operation errors.
///
/// Every variant is fatal for the handshake or session that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or disallowed content from the peer.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A handshake message arrived in a state that does not expect it.
    #[error("Unexpected {got} while waiting for {expected}")]
    UnexpectedMessage {
        /// Message the current state accepts.
        expected: &'static str,
        /// Message actually received.
        got: &'static str,
    },

    /// Not enough bytes to decode a structure.
    #[error("Insufficient data: need {0} bytes")]
    InsufficientData(usize),

    /// The peer sent an alert record.
    #[error("Peer sent alert: level {level}, description {description}")]
    PeerAlert {
        /// Alert level (1 = warning, 2 = fatal).
        level: u8,
        /// Alert description code (RFC 5246 §7.2).
        description: u8,
    },

    /// AEAD tag verification failed on an incoming record.
    #[error("Record authentication failed")]
    AuthenticationFailure,

    /// The peer's Finished verify_data does not match the transcript.
    #[error("Finished verification failed")]
    VerificationFailure,

    /// The certificate verifier rejected the server's chain.
    #[error("Certificate rejected: {0}")]
    Certificate(String),

    /// Sequence number space exhausted for a direction.
    #[error("Sequence number overflow")]
    SequenceOverflow,

    /// Operation not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Cryptographic primitive error.
    #[error("Crypto error: {0}")]
    Crypto(#[from] minitls_crypto::Error),
}
