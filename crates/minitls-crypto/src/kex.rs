//! Ephemeral key agreement.
//!
//! Only X25519 (RFC 7748) is supported: it is the single named group offered
//! in the ClientHello and accepted in the ServerKeyExchange.

pub mod x25519;

pub use self::x25519::{parse_public_key, EphemeralKeyPair, NAMED_GROUP_X25519, PUBLIC_KEY_LEN};
