//! Cryptographic primitives for the minitls TLS 1.2 client.
//!
//! This crate implements the primitives behind the single supported suite
//! (TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256):
//! - Ephemeral key agreement (X25519, RFC 7748)
//! - AEAD record protection (AES-128-GCM, RFC 5288 nonce layout)
//! - TLS 1.2 PRF with P_SHA256 and the derivations built on it (RFC 5246)
//!
//! Security conventions:
//! - Private keys, shared secrets and derived secrets use `Zeroizing` wrappers
//! - No logging of key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod error;
pub mod kex;
pub mod prf;
pub mod suite;

pub use error::{Error, Result};
pub use suite::CipherSuite;
