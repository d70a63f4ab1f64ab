//! Record and handshake wire format conformance tests (RFC 5246, RFC 5288).
//!
//! Verifies exact byte layouts independently of the codec internals.

use minitls_core::key_schedule::KeyMaterial;
use minitls_core::message::{HandshakeMessage, TYPE_CLIENT_KEY_EXCHANGE, TYPE_FINISHED};
use minitls_core::record::{build_aad, Record, RecordHeader};
use minitls_core::{ContentType, Direction, RecordLayer};
use minitls_crypto::aead::{aes128gcm_encrypt, construct_nonce};
use zeroize::Zeroizing;

fn key_material() -> KeyMaterial {
    let key_block = hex::decode(
        "000102030405060708090a0b0c0d0e0f\
         101112131415161718191a1b1c1d1e1f\
         a0a1a2a3\
         b0b1b2b3",
    )
    .unwrap();
    KeyMaterial::from_key_block(Zeroizing::new([0x42; 48]), &key_block).unwrap()
}

/// Test record header layout per RFC 5246 §6.2.1.
#[test]
fn test_record_header_format() {
    let bytes = Record::new(ContentType::ApplicationData, vec![0xEE; 300])
        .serialize()
        .unwrap();

    // type(1) || version(2) || length(2)
    assert_eq!(&bytes[..5], &[0x17, 0x03, 0x03, 0x01, 0x2C]);
    assert_eq!(bytes.len(), 5 + 300);

    let header = RecordHeader::parse(&bytes).unwrap();
    assert_eq!(header.content_type, ContentType::ApplicationData);
    assert_eq!(header.length, 300);
}

/// Test AAD layout per RFC 5246 §6.2.3.3.
#[test]
fn test_aad_format() {
    let aad = build_aad(0x0102030405060708, ContentType::Handshake, 0x0303, 16);
    assert_eq!(hex::encode(aad), "01020304050607081603030010");
}

/// Test that a sealed record equals AES-128-GCM under fixed_iv || seq with the TLS AAD.
#[test]
fn test_sealed_record_matches_reference_construction() {
    let keys = key_material();
    let mut records = RecordLayer::new(&keys);

    let plaintext = b"GET / HTTP/1.0\r\n\r\n";
    let first = records
        .seal(Direction::ClientToServer, ContentType::Handshake, plaintext)
        .unwrap();
    let second = records
        .seal(Direction::ClientToServer, ContentType::ApplicationData, plaintext)
        .unwrap();

    for (seq, content_type, record) in [
        (0u64, ContentType::Handshake, &first),
        (1u64, ContentType::ApplicationData, &second),
    ] {
        let nonce = construct_nonce(keys.client_write_iv(), &seq.to_be_bytes());
        let aad = build_aad(seq, content_type, 0x0303, plaintext.len());
        let expected = aes128gcm_encrypt(keys.client_write_key(), &nonce, plaintext, &aad).unwrap();

        assert_eq!(&record.fragment[..8], &seq.to_be_bytes());
        assert_eq!(&record.fragment[8..], expected.as_slice());
    }
}

/// Test that the server direction uses the server key and IV.
#[test]
fn test_server_direction_uses_server_keys() {
    let keys = key_material();
    let mut records = RecordLayer::new(&keys);

    let record = records
        .seal(Direction::ServerToClient, ContentType::ApplicationData, b"pong")
        .unwrap();

    let nonce = construct_nonce(keys.server_write_iv(), &0u64.to_be_bytes());
    let aad = build_aad(0, ContentType::ApplicationData, 0x0303, 4);
    let expected = aes128gcm_encrypt(keys.server_write_key(), &nonce, b"pong", &aad).unwrap();
    assert_eq!(&record.fragment[8..], expected.as_slice());
}

/// Test ClientKeyExchange format per RFC 8422 §5.7.
#[test]
fn test_client_key_exchange_format() {
    let bytes = HandshakeMessage::ClientKeyExchange {
        public_key: [0x09; 32],
    }
    .serialize()
    .unwrap();

    // type || uint24 length (33) || opaque point<1..255> (32)
    assert_eq!(bytes[0], TYPE_CLIENT_KEY_EXCHANGE);
    assert_eq!(&bytes[1..5], &[0x00, 0x00, 0x21, 0x20]);
    assert_eq!(bytes.len(), 4 + 1 + 32);
}

/// Test Finished format per RFC 5246 §7.4.9.
#[test]
fn test_finished_format() {
    let bytes = HandshakeMessage::Finished {
        verify_data: [0x77; 12],
    }
    .serialize()
    .unwrap();

    assert_eq!(bytes[0], TYPE_FINISHED);
    assert_eq!(&bytes[1..4], &[0x00, 0x00, 0x0C]);
    assert_eq!(&bytes[4..], &[0x77; 12]);
}

/// Test ClientHello extension block per RFC 6066 §3 and RFC 8422 §5.1.
#[test]
fn test_client_hello_extensions() {
    let bytes = HandshakeMessage::ClientHello {
        random: [0; 32],
        session_id: Vec::new(),
        cipher_suites: vec![0xC02F],
        server_name: Some("a.io".into()),
    }
    .serialize()
    .unwrap();

    // header(4) version(2) random(32) sid(1) suites(2+2) compression(1+1)
    let extensions = &bytes[4 + 2 + 32 + 1 + 4 + 2..];
    let total = u16::from_be_bytes([extensions[0], extensions[1]]) as usize;
    assert_eq!(total, extensions.len() - 2);

    // server_name: list(2) || host_name(0) || len(2) || "a.io"
    assert_eq!(
        &extensions[2..15],
        &[0x00, 0x00, 0x00, 0x09, 0x00, 0x07, 0x00, 0x00, 0x04, b'a', b'.', b'i', b'o']
    );
    // supported_groups: x25519 only
    assert_eq!(
        &extensions[15..23],
        &[0x00, 0x0A, 0x00, 0x04, 0x00, 0x02, 0x00, 0x1D]
    );
    // ec_point_formats: uncompressed only
    assert_eq!(&extensions[23..29], &[0x00, 0x0B, 0x00, 0x02, 0x01, 0x00]);
    // signature_algorithms follows
    assert_eq!(&extensions[29..31], &[0x00, 0x0D]);
}
