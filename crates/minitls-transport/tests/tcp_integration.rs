//! TCP session integration tests.
//!
//! Tests run a real `Session` against the loopback server in `test_helpers`:
//! - Handshake, echo and sequence counters
//! - Fatal handshake errors (out-of-order flight, Finished mismatch, rejected certificate)
//! - Fatal record errors (tampered record) and server close_notify
//! - Usage and connection errors, including a server hanging up mid-handshake


use minitls_core::ServerCertVerifier;
use minitls_transport::{Error, Result, Session};
use std::net::TcpListener;
use std::sync::Arc;
use test_helpers::{client_config, spawn_server, Behavior};

/// Test: connect, send "ping", receive the echo
#[test]
fn test_ping_echo() -> Result<()> {
    let server = spawn_server(Behavior::Conformant);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;
    assert!(session.is_established());
    assert_eq!(session.peer_addr(), Some(server.addr));

    session.send(b"ping")?;
    assert_eq!(session.recv()?, b"ping");

    // Sequence 0 went to the Finished exchange.
    assert_eq!(session.write_sequence(), Some(1));
    assert_eq!(session.read_sequence(), Some(1));

    session.close()?;
    assert!(!session.is_established());

    assert_eq!(server.join()?, vec![b"ping".to_vec()]);
    Ok(())
}

/// Test: counters advance once per record in each direction
#[test]
fn test_several_round_trips() -> Result<()> {
    let server = spawn_server(Behavior::Conformant);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;

    let messages: [&[u8]; 3] = [b"one", b"two", &[0xAB; 4096]];
    for message in messages {
        session.send(message)?;
        assert_eq!(session.recv()?, message);
    }
    assert_eq!(session.write_sequence(), Some(3));
    assert_eq!(session.read_sequence(), Some(3));

    session.close()?;
    assert_eq!(server.join()?.len(), 3);
    Ok(())
}

/// Test: handshake messages split over many records
#[test]
fn test_fragmented_server_flight() -> Result<()> {
    let server = spawn_server(Behavior::FragmentedFlight);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;
    session.send(b"ping")?;
    assert_eq!(session.recv()?, b"ping");

    session.close()?;
    server.join()?;
    Ok(())
}

/// Test: host name resolution picks an IPv4 address
#[test]
fn test_localhost_resolves_to_ipv4() -> Result<()> {
    let server = spawn_server(Behavior::Conformant);

    let mut session = Session::with_config("localhost", client_config(server.addr));
    session.connect()?;
    assert!(session.peer_addr().map_or(false, |addr| addr.is_ipv4()));

    session.close()?;
    server.join()?;
    Ok(())
}

/// Test: Certificate before ServerHello aborts the handshake
#[test]
fn test_certificate_before_server_hello() {
    let server = spawn_server(Behavior::CertificateFirst);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    let result = session.connect();

    assert!(matches!(
        result,
        Err(Error::Protocol(minitls_core::Error::UnexpectedMessage {
            expected: "ServerHello",
            got: "Certificate"
        }))
    ));
    assert!(!session.is_established());
    assert!(matches!(session.send(b"ping"), Err(Error::Closed)));

    let _ = server.join();
}

/// Test: a wrong server Finished is detected
#[test]
fn test_mismatched_server_finished() {
    let server = spawn_server(Behavior::BadFinished);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    let result = session.connect();

    assert!(matches!(
        result,
        Err(Error::Protocol(minitls_core::Error::VerificationFailure))
    ));
    assert!(!session.is_established());
    assert!(session.write_sequence().is_none());

    let _ = server.join();
}

/// Test: a corrupted record is fatal
#[test]
fn test_tampered_record() -> Result<()> {
    let server = spawn_server(Behavior::TamperedReply);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;
    session.send(b"ping")?;

    assert!(matches!(
        session.recv(),
        Err(Error::Protocol(minitls_core::Error::AuthenticationFailure))
    ));
    assert!(!session.is_established());
    assert!(matches!(session.recv(), Err(Error::Closed)));

    server.join()?;
    Ok(())
}

/// Test: server close_notify ends the session
#[test]
fn test_server_close_notify() -> Result<()> {
    let server = spawn_server(Behavior::CloseNotify);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;
    session.send(b"bye")?;

    assert!(matches!(session.recv(), Err(Error::Closed)));
    assert!(!session.is_established());

    assert_eq!(server.join()?, vec![b"bye".to_vec()]);
    Ok(())
}

/// Test: server hanging up mid-handshake is a connection failure
#[test]
fn test_server_hangs_up_during_handshake() -> Result<()> {
    let server = spawn_server(Behavior::HangUpAfterHello);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    let result = session.connect();
    assert!(
        matches!(result, Err(Error::ConnectionFailed(_))),
        "unexpected result: {:?}",
        result
    );
    assert!(!session.is_established());

    server.join()?;
    Ok(())
}

/// Test: an oversized payload is refused without ending the session
#[test]
fn test_oversized_send_keeps_session() -> Result<()> {
    let server = spawn_server(Behavior::Conformant);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;

    assert!(matches!(
        session.send(&vec![0u8; 16_385]),
        Err(Error::PayloadTooLarge {
            len: 16_385,
            max: 16_384
        })
    ));
    assert!(session.is_established());
    assert_eq!(session.write_sequence(), Some(0));

    // The largest record still goes through.
    let largest = vec![0x7Eu8; 16_384];
    session.send(&largest)?;
    assert_eq!(session.recv()?, largest);
    session.send(b"ping")?;
    assert_eq!(session.recv()?, b"ping");
    assert_eq!(session.write_sequence(), Some(2));

    session.close()?;
    assert_eq!(server.join()?.len(), 2);
    Ok(())
}

/// Test: a custom verifier can refuse the server
#[test]
fn test_rejecting_verifier() {
    struct PinnedLeaf(Vec<u8>);

    impl ServerCertVerifier for PinnedLeaf {
        fn verify(&self, _server_name: &str, chain: &[Vec<u8>]) -> minitls_core::Result<()> {
            match chain.first() {
                Some(leaf) if *leaf == self.0 => Ok(()),
                _ => Err(minitls_core::Error::Certificate("leaf not pinned".into())),
            }
        }
    }

    let server = spawn_server(Behavior::Conformant);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.set_verifier(Arc::new(PinnedLeaf(vec![0x30, 0x00])));

    assert!(matches!(
        session.connect(),
        Err(Error::Protocol(minitls_core::Error::Certificate(_)))
    ));

    let _ = server.join();
}

/// Test: send/recv before connect
#[test]
fn test_send_before_connect() {
    let mut session = Session::new("127.0.0.1", 443);
    assert!(matches!(session.send(b"ping"), Err(Error::NotEstablished)));
    assert!(matches!(session.recv(), Err(Error::NotEstablished)));
}

/// Test: nothing listening on the port
#[test]
fn test_connection_refused() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut session = Session::new("127.0.0.1", port);
    assert!(matches!(session.connect(), Err(Error::ConnectionFailed(_))));
    assert!(matches!(session.send(b"ping"), Err(Error::Closed)));
}

/// Test: connect twice
#[test]
fn test_connect_twice() -> Result<()> {
    let server = spawn_server(Behavior::Conformant);

    let mut session = Session::with_config("127.0.0.1", client_config(server.addr));
    session.connect()?;
    assert!(matches!(
        session.connect(),
        Err(Error::Protocol(minitls_core::Error::InvalidState(_)))
    ));
    // Still usable.
    session.send(b"ping")?;
    assert_eq!(session.recv()?, b"ping");

    session.close()?;
    server.join()?;
    Ok(())
}
