//! Connect to a TLS 1.2 server, send one message and print the reply.
//!
//! Usage: `minitls-ping <host> [port] [message]`
//!
//! Set `RUST_LOG=debug` to follow the handshake.

use minitls_transport::{Session, SessionConfig};
use std::env;
use std::time::Duration;

const USAGE: &str = "usage: minitls-ping <host> [port] [message]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let host = args.next().ok_or(USAGE)?;
    let port = match args.next() {
        Some(port) => port
            .parse::<u16>()
            .map_err(|e| format!("invalid port {:?}: {}\n{}", port, e, USAGE))?,
        None => 443,
    };
    let message = args.next().unwrap_or_else(|| "ping".to_string());

    let config = SessionConfig {
        port,
        connect_timeout: Some(Duration::from_secs(10)),
        read_timeout: Some(Duration::from_secs(10)),
        write_timeout: Some(Duration::from_secs(10)),
        ..SessionConfig::default()
    };

    let mut session = Session::with_config(host.as_str(), config);
    session.connect()?;
    if let Some(addr) = session.peer_addr() {
        eprintln!("Connected to {} ({})", host, addr);
    }

    session.send(message.as_bytes())?;
    let reply = session.recv()?;
    println!("{}", String::from_utf8_lossy(&reply));

    session.close()?;
    Ok(())
}
