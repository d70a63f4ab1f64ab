//! Blocking TCP transport for the minitls TLS 1.2 client.
//!
//! Drives the sans-I/O handshake from minitls-core over a
//! `std::net::TcpStream`:
//! - `Session::connect` resolves the host, connects and completes the handshake
//! - `Session::send` / `Session::recv` exchange application data records
//!
//! Everything is synchronous; a session is used from one thread at a time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod io;
pub mod session;

pub use error::{Error, Result};
pub use session::{Session, SessionConfig};
