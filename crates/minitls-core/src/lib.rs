//! Core protocol engine for the minitls TLS 1.2 client.
//!
//! This crate implements the client handshake and record protection without
//! performing any I/O:
//! - Handshake message codec and reassembly (RFC 5246 §7.4)
//! - Record framing and AES-128-GCM protection with per-direction sequence numbers (§6.2)
//! - Key schedule: master secret, key block, Finished values (§8.1, §6.3, §7.4.9)
//! - Client handshake state machine with server Finished verification
//!
//! Socket handling lives in minitls-transport.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod handshake;
pub mod key_schedule;
pub mod message;
pub mod record;
pub mod verifier;

pub use error::{Error, Result};
pub use handshake::ClientHandshake;
pub use key_schedule::{KeyMaterial, Transcript};
pub use message::HandshakeMessage;
pub use record::{ContentType, Direction, Record, RecordLayer, SequenceNumber};
pub use verifier::{AcceptAnyCertificate, ServerCertVerifier};
