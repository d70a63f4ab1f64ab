//! Blocking TLS 1.2 client session over TCP.
//!
//! A `Session` owns its socket and record layer for its whole lifetime. Any
//! protocol, authentication or I/O error is fatal: the socket is dropped,
//! the keys are wiped and later calls return `Error::Closed`.

use crate::io::{read_record, write_record, write_records};
use crate::{Error, Result};
use minitls_core::handshake::DEFAULT_MAX_HANDSHAKE_MESSAGE_LEN;
use minitls_core::record::{
    decode_alert, ALERT_CLOSE_NOTIFY, ALERT_LEVEL_WARNING, MAX_PLAINTEXT_LEN,
};
use minitls_core::{
    AcceptAnyCertificate, ClientHandshake, ContentType, Direction, RecordLayer,
    ServerCertVerifier,
};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Default TLS port.
pub const DEFAULT_PORT: u16 = 443;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server TCP port.
    pub port: u16,
    /// TCP connect timeout (`None` blocks until the OS gives up).
    pub connect_timeout: Option<Duration>,
    /// Socket read timeout (`None` blocks indefinitely).
    pub read_timeout: Option<Duration>,
    /// Socket write timeout (`None` blocks indefinitely).
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
    /// Largest handshake message body accepted from the server.
    pub max_handshake_message_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
            max_handshake_message_len: DEFAULT_MAX_HANDSHAKE_MESSAGE_LEN,
        }
    }
}

enum SessionState {
    /// `connect` not called yet.
    Idle,
    /// Handshake complete, application data allowed.
    Established {
        stream: TcpStream,
        records: RecordLayer,
    },
    /// Closed by the caller or by a fatal error.
    Closed,
}

/// TLS 1.2 client session.
///
/// # Example
///
/// ```no_run
/// use minitls_transport::Session;
///
/// # fn main() -> minitls_transport::Result<()> {
/// let mut session = Session::new("example.com", 443);
/// session.connect()?;
/// session.send(b"GET / HTTP/1.0\r\nHost: example.com\r\n\r\n")?;
/// let reply = session.recv()?;
/// println!("{}", String::from_utf8_lossy(&reply));
/// session.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    hostname: String,
    config: SessionConfig,
    verifier: Arc<dyn ServerCertVerifier>,
    peer_addr: Option<SocketAddr>,
    state: SessionState,
}

impl Session {
    /// Create a session for `hostname:port` with default settings.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self::with_config(
            hostname,
            SessionConfig {
                port,
                ..SessionConfig::default()
            },
        )
    }

    /// Create a session with custom configuration.
    pub fn with_config(hostname: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            hostname: hostname.into(),
            config,
            verifier: Arc::new(AcceptAnyCertificate),
            peer_addr: None,
            state: SessionState::Idle,
        }
    }

    /// Replace the certificate verifier used by the next `connect`.
    pub fn set_verifier(&mut self, verifier: Arc<dyn ServerCertVerifier>) {
        self.verifier = verifier;
    }

    /// Target host name.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Resolved server address, once `connect` got that far.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Check if the handshake is complete and the session usable.
    pub fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Established { .. })
    }

    /// Client-write sequence number (last used).
    pub fn write_sequence(&self) -> Option<u64> {
        match &self.state {
            SessionState::Established { records, .. } => {
                Some(records.sequence(Direction::ClientToServer))
            }
            _ => None,
        }
    }

    /// Server-write sequence number (last used).
    pub fn read_sequence(&self) -> Option<u64> {
        match &self.state {
            SessionState::Established { records, .. } => {
                Some(records.sequence(Direction::ServerToClient))
            }
            _ => None,
        }
    }

    /// Resolve, connect and run the handshake to completion.
    ///
    /// # Errors
    ///
    /// `Error::ConnectionFailed` if resolution or connect fails, or if the
    /// server hangs up before the handshake completes; any other handshake
    /// error is returned as is. The session is closed afterwards
    /// in both cases.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Established { .. } => {
                return Err(Error::Protocol(minitls_core::Error::InvalidState(
                    "session already connected",
                )))
            }
            SessionState::Closed => return Err(Error::Closed),
        }

        let result = self.establish();
        match result {
            Ok((stream, records)) => {
                tracing::info!(
                    host = %self.hostname,
                    peer = ?self.peer_addr,
                    "TLS 1.2 session established"
                );
                self.state = SessionState::Established { stream, records };
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn establish(&mut self) -> Result<(TcpStream, RecordLayer)> {
        let addr = self.resolve()?;
        self.peer_addr = Some(addr);
        let mut stream = self.open(addr)?;

        let records = self.handshake(&mut stream)?;
        Ok((stream, records))
    }

    /// First IPv4 address of the host.
    fn resolve(&self) -> Result<SocketAddr> {
        let addrs = (self.hostname.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(|e| {
                Error::ConnectionFailed(format!("Cannot resolve {}: {}", self.hostname, e))
            })?;

        let addr = addrs.into_iter().find(SocketAddr::is_ipv4).ok_or_else(|| {
            Error::ConnectionFailed(format!("No IPv4 address for {}", self.hostname))
        })?;
        tracing::debug!(host = %self.hostname, %addr, "Resolved");
        Ok(addr)
    }

    fn open(&self, addr: SocketAddr) -> Result<TcpStream> {
        let stream = match self.config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| Error::ConnectionFailed(format!("Connect to {} failed: {}", addr, e)))?;

        stream.set_read_timeout(self.config.read_timeout)?;
        stream.set_write_timeout(self.config.write_timeout)?;
        stream.set_nodelay(self.config.nodelay)?;
        Ok(stream)
    }

    fn handshake(&self, stream: &mut TcpStream) -> Result<RecordLayer> {
        let mut handshake = ClientHandshake::new(self.hostname.clone())
            .with_verifier(Arc::clone(&self.verifier))
            .with_max_message_len(self.config.max_handshake_message_len);

        write_record(stream, &handshake.start()?)?;

        while !handshake.is_established() {
            let record = read_record(stream).map_err(|e| match e {
                Error::Closed => Error::ConnectionFailed(format!(
                    "Peer closed the connection during the handshake ({})",
                    handshake.state_name()
                )),
                other => other,
            })?;
            let outgoing = handshake.handle_record(&record)?;
            if !outgoing.is_empty() {
                write_records(stream, &outgoing)?;
            }
        }

        Ok(handshake.into_record_layer()?)
    }

    /// Send `data` as one application data record.
    ///
    /// # Errors
    ///
    /// `Error::NotEstablished` before `connect` succeeded.
    /// `Error::PayloadTooLarge` for payloads above 2^14 bytes; nothing is
    /// sent and the session stays established.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let result = match &mut self.state {
            SessionState::Established { .. } if data.len() > MAX_PLAINTEXT_LEN => {
                return Err(Error::PayloadTooLarge {
                    len: data.len(),
                    max: MAX_PLAINTEXT_LEN,
                })
            }
            SessionState::Established { stream, records } => {
                Self::send_record(stream, records, ContentType::ApplicationData, data)
            }
            SessionState::Idle => return Err(Error::NotEstablished),
            SessionState::Closed => return Err(Error::Closed),
        };
        result.or_else(|e| self.fail(e))
    }

    /// Block until one application data record arrives and return its plaintext.
    ///
    /// # Errors
    ///
    /// `Error::NotEstablished` before `connect` succeeded, `Error::Closed`
    /// after the server sent close_notify or closed the connection.
    pub fn recv(&mut self) -> Result<Vec<u8>> {
        let result = match &mut self.state {
            SessionState::Established { stream, records } => Self::recv_record(stream, records),
            SessionState::Idle => return Err(Error::NotEstablished),
            SessionState::Closed => return Err(Error::Closed),
        };
        result.or_else(|e| self.fail(e))
    }

    /// Send close_notify, shut the socket down and wipe the keys.
    ///
    /// Closing a session that is not established only marks it closed.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Established {
                mut stream,
                mut records,
            } => {
                let alert = [ALERT_LEVEL_WARNING, ALERT_CLOSE_NOTIFY];
                if let Err(e) =
                    Self::send_record(&mut stream, &mut records, ContentType::Alert, &alert)
                {
                    tracing::debug!(error = %e, "close_notify not delivered");
                }
                match stream.shutdown(Shutdown::Both) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotConnected => Err(e.into()),
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    fn send_record(
        stream: &mut TcpStream,
        records: &mut RecordLayer,
        content_type: ContentType,
        data: &[u8],
    ) -> Result<()> {
        let record = records.seal(Direction::ClientToServer, content_type, data)?;
        write_record(stream, &record)
    }

    fn recv_record(stream: &mut TcpStream, records: &mut RecordLayer) -> Result<Vec<u8>> {
        let record = read_record(stream)?;
        let plaintext = records.open(Direction::ServerToClient, &record)?;

        match record.content_type {
            ContentType::ApplicationData => Ok(plaintext.to_vec()),
            ContentType::Alert => match decode_alert(&plaintext) {
                minitls_core::Error::PeerAlert {
                    description: ALERT_CLOSE_NOTIFY,
                    ..
                } => Err(Error::Closed),
                alert => Err(alert.into()),
            },
            other => Err(minitls_core::Error::UnexpectedMessage {
                expected: "ApplicationData",
                got: other.name(),
            }
            .into()),
        }
    }

    /// Drop socket and keys, then report `error`.
    fn fail<T>(&mut self, error: Error) -> Result<T> {
        if !matches!(error, Error::Closed) {
            tracing::warn!(host = %self.hostname, error = %error, "Session aborted");
        }
        self.state = SessionState::Closed;
        Err(error)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("hostname", &self.hostname)
            .field("port", &self.config.port)
            .field("peer_addr", &self.peer_addr)
            .field("established", &self.is_established())
            .finish()
    }
}
