//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Key exchange failed.
    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    /// AEAD encryption failed.
    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    /// AEAD decryption failed (tag mismatch or malformed input).
    #[error("AEAD decryption failed: {0}")]
    Decryption(String),

    /// PRF expansion failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Invalid input length.
    #[error("Invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length received in bytes.
        actual: usize,
    },
}
