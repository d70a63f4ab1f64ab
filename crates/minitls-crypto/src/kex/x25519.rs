//! X25519 ephemeral Diffie-Hellman (RFC 7748, RFC 8422 §5.4).
//!
//! One key pair is generated per handshake and consumed by the single
//! agreement that produces the pre-master secret.
//!
//! # Example
//!
//! ```
//! use minitls_crypto::kex::EphemeralKeyPair;
//!
//! # fn example() -> Result<(), minitls_crypto::Error> {
//! let client = EphemeralKeyPair::generate();
//! let server = EphemeralKeyPair::generate();
//! let client_public = *client.public_key();
//! let server_public = *server.public_key();
//!
//! let client_shared = client.agree(&server_public)?;
//! let server_shared = server.agree(&client_public)?;
//! assert_eq!(*client_shared, *server_shared);
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// IANA named group identifier for x25519 (RFC 8422).
pub const NAMED_GROUP_X25519: u16 = 0x001D;

/// Encoded X25519 public key length.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Single-use X25519 key pair.
///
/// The private scalar is zeroed when the pair is dropped or consumed.
pub struct EphemeralKeyPair {
    private_key: Zeroizing<StaticSecret>,
    public_key: PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a fresh key pair from the operating system RNG.
    pub fn generate() -> Self {
        let private_key = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public_key = PublicKey::from(&private_key);

        Self {
            private_key: Zeroizing::new(private_key),
            public_key,
        }
    }

    /// Build a key pair from a known private scalar.
    ///
    /// Used by tests with fixed vectors; production code calls `generate()`.
    #[doc(hidden)]
    pub fn from_private(private: [u8; 32]) -> Self {
        let private_key = StaticSecret::from(private);
        let public_key = PublicKey::from(&private_key);

        Self {
            private_key: Zeroizing::new(private_key),
            public_key,
        }
    }

    /// Public key as sent in ClientKeyExchange / ServerKeyExchange.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        self.public_key.as_bytes()
    }

    /// Compute the shared secret with the peer's public key, consuming the pair.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyExchange` if the result is all zeros, which happens
    /// for low-order peer points (RFC 7748 §6.1).
    pub fn agree(self, peer_public: &[u8; PUBLIC_KEY_LEN]) -> Result<Zeroizing<[u8; 32]>> {
        let peer_key = PublicKey::from(*peer_public);
        let shared = self.private_key.diffie_hellman(&peer_key);

        if shared.as_bytes() == &[0u8; 32] {
            return Err(Error::KeyExchange(
                "Invalid peer public key (low-order point)".into(),
            ));
        }

        Ok(Zeroizing::new(*shared.as_bytes()))
    }
}

/// Interpret wire bytes as an X25519 public key.
///
/// # Errors
///
/// Returns `Error::InvalidLength` unless exactly 32 bytes are given.
pub fn parse_public_key(bytes: &[u8]) -> Result<[u8; PUBLIC_KEY_LEN]> {
    bytes.try_into().map_err(|_| Error::InvalidLength {
        expected: PUBLIC_KEY_LEN,
        actual: bytes.len(),
    })
}
