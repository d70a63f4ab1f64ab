//! Client handshake state machine (RFC 5246 §7.3, full ECDHE handshake).
//!
//! ```text
//! Init
//!   -> HelloSent                  (ClientHello sent)
//!   -> ServerHelloReceived
//!   -> CertificateReceived
//!   -> ServerKeyExchangeReceived
//!   -> ServerDoneReceived
//!   -> KeysDerived                (key schedule run exactly once)
//!   -> ClientKeyExchangeSent
//!   -> ClientFinishedSent         (ChangeCipherSpec + encrypted Finished sent)
//!   -> Established                (server ChangeCipherSpec + Finished verified)
//! ```
//!
//! The machine is sans-I/O: it consumes [`Record`]s and produces the records
//! to write. Any error moves it to a terminal failed state.

use crate::key_schedule::{KeyMaterial, Transcript};
use crate::message::{
    type_name, HandshakeDeframer, HandshakeMessage, TLS12_VERSION, TYPE_CERTIFICATE,
    TYPE_FINISHED, TYPE_SERVER_HELLO, TYPE_SERVER_HELLO_DONE, TYPE_SERVER_KEY_EXCHANGE,
};
use crate::record::{decode_alert, ContentType, Direction, Record, RecordLayer};
use crate::verifier::{AcceptAnyCertificate, ServerCertVerifier};
use crate::{Error, Result};
use minitls_crypto::kex::{parse_public_key, EphemeralKeyPair, NAMED_GROUP_X25519, PUBLIC_KEY_LEN};
use minitls_crypto::CipherSuite;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Default cap on a single handshake message body.
pub const DEFAULT_MAX_HANDSHAKE_MESSAGE_LEN: usize = 64 * 1024;

/// ChangeCipherSpec payload.
pub const CHANGE_CIPHER_SPEC: [u8; 1] = [1];

/// Handshake states. Each carries exactly what the next step needs.
enum HandshakeState {
    /// Nothing sent yet.
    Init,
    /// ClientHello sent, awaiting ServerHello.
    HelloSent {
        client_random: [u8; 32],
        keypair: EphemeralKeyPair,
    },
    /// Awaiting Certificate.
    ServerHelloReceived {
        client_random: [u8; 32],
        server_random: [u8; 32],
        keypair: EphemeralKeyPair,
    },
    /// Awaiting ServerKeyExchange.
    CertificateReceived {
        client_random: [u8; 32],
        server_random: [u8; 32],
        keypair: EphemeralKeyPair,
    },
    /// Awaiting ServerHelloDone.
    ServerKeyExchangeReceived {
        client_random: [u8; 32],
        server_random: [u8; 32],
        keypair: EphemeralKeyPair,
        server_public: [u8; PUBLIC_KEY_LEN],
    },
    /// Server flight complete; key schedule not yet run.
    ServerDoneReceived {
        client_random: [u8; 32],
        server_random: [u8; 32],
        keypair: EphemeralKeyPair,
        server_public: [u8; PUBLIC_KEY_LEN],
    },
    /// Keys derived; ClientKeyExchange not yet sent.
    KeysDerived {
        keys: KeyMaterial,
        client_public: [u8; PUBLIC_KEY_LEN],
    },
    /// ClientKeyExchange sent; encryption not yet active.
    ClientKeyExchangeSent { keys: KeyMaterial },
    /// Client Finished sent, awaiting server ChangeCipherSpec then Finished.
    ClientFinishedSent {
        keys: KeyMaterial,
        records: RecordLayer,
        server_ccs: bool,
    },
    /// Handshake complete.
    Established { records: RecordLayer },
    /// A fatal error occurred.
    Failed,
}

impl HandshakeState {
    fn name(&self) -> &'static str {
        match self {
            HandshakeState::Init => "Init",
            HandshakeState::HelloSent { .. } => "HelloSent",
            HandshakeState::ServerHelloReceived { .. } => "ServerHelloReceived",
            HandshakeState::CertificateReceived { .. } => "CertificateReceived",
            HandshakeState::ServerKeyExchangeReceived { .. } => "ServerKeyExchangeReceived",
            HandshakeState::ServerDoneReceived { .. } => "ServerDoneReceived",
            HandshakeState::KeysDerived { .. } => "KeysDerived",
            HandshakeState::ClientKeyExchangeSent { .. } => "ClientKeyExchangeSent",
            HandshakeState::ClientFinishedSent { .. } => "ClientFinishedSent",
            HandshakeState::Established { .. } => "Established",
            HandshakeState::Failed => "Failed",
        }
    }

    /// Handshake message type accepted in this state.
    fn expected_message(&self) -> Option<u8> {
        match self {
            HandshakeState::HelloSent { .. } => Some(TYPE_SERVER_HELLO),
            HandshakeState::ServerHelloReceived { .. } => Some(TYPE_CERTIFICATE),
            HandshakeState::CertificateReceived { .. } => Some(TYPE_SERVER_KEY_EXCHANGE),
            HandshakeState::ServerKeyExchangeReceived { .. } => Some(TYPE_SERVER_HELLO_DONE),
            HandshakeState::ClientFinishedSent {
                server_ccs: true, ..
            } => Some(TYPE_FINISHED),
            _ => None,
        }
    }

    fn expected_name(&self) -> &'static str {
        match self {
            HandshakeState::ClientFinishedSent {
                server_ccs: false, ..
            } => "ChangeCipherSpec",
            other => other
                .expected_message()
                .map(type_name)
                .unwrap_or("no handshake message"),
        }
    }
}

/// Client side of a TLS 1.2 ECDHE handshake.
pub struct ClientHandshake {
    server_name: String,
    verifier: Arc<dyn ServerCertVerifier>,
    transcript: Transcript,
    deframer: HandshakeDeframer,
    state: HandshakeState,
}

/// Generate 32 random bytes using a cryptographically secure RNG.
fn random_bytes_32() -> [u8; 32] {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

impl ClientHandshake {
    /// New handshake for `server_name`, accepting any certificate.
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            verifier: Arc::new(AcceptAnyCertificate),
            transcript: Transcript::new(),
            deframer: HandshakeDeframer::new(DEFAULT_MAX_HANDSHAKE_MESSAGE_LEN),
            state: HandshakeState::Init,
        }
    }

    /// Use `verifier` for the server's certificate chain.
    pub fn with_verifier(mut self, verifier: Arc<dyn ServerCertVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Cap the size of a single handshake message body.
    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.deframer = HandshakeDeframer::new(max_message_len);
        self
    }

    /// Name of the current state.
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Check if the handshake is complete.
    pub fn is_established(&self) -> bool {
        matches!(self.state, HandshakeState::Established { .. })
    }

    /// Check if the handshake has aborted.
    pub fn is_failed(&self) -> bool {
        matches!(self.state, HandshakeState::Failed)
    }

    /// Handshake messages exchanged so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Hand over the record layer of an established handshake.
    pub fn into_record_layer(self) -> Result<RecordLayer> {
        match self.state {
            HandshakeState::Established { records } => Ok(records),
            _ => Err(Error::InvalidState("handshake not established")),
        }
    }

    /// Begin the handshake.
    ///
    /// Returns the ClientHello record to send.
    pub fn start(&mut self) -> Result<Record> {
        if !matches!(self.state, HandshakeState::Init) {
            return Err(Error::InvalidState("handshake already started"));
        }

        let keypair = EphemeralKeyPair::generate();
        let client_random = random_bytes_32();

        // SNI carries host names only (RFC 6066 §3).
        let server_name = if self.server_name.parse::<std::net::IpAddr>().is_ok() {
            None
        } else {
            Some(self.server_name.clone())
        };

        let hello = HandshakeMessage::ClientHello {
            random: client_random,
            session_id: Vec::new(),
            cipher_suites: vec![CipherSuite::EcdheRsaAes128GcmSha256.to_u16()],
            server_name,
        }
        .serialize()?;
        self.transcript.append(&hello);

        self.state = HandshakeState::HelloSent {
            client_random,
            keypair,
        };
        tracing::debug!(server_name = %self.server_name, "ClientHello sent");

        Ok(Record::new(ContentType::Handshake, hello))
    }

    /// Process one record from the server.
    ///
    /// Returns the records to send in response (possibly none).
    pub fn handle_record(&mut self, record: &Record) -> Result<Vec<Record>> {
        match self.state {
            HandshakeState::Init => return Err(Error::InvalidState("handshake not started")),
            HandshakeState::Established { .. } => {
                return Err(Error::InvalidState("handshake already complete"))
            }
            HandshakeState::Failed => return Err(Error::InvalidState("handshake failed")),
            _ => {}
        }

        let result = self.process_record(record);
        if let Err(ref e) = result {
            tracing::warn!(state = self.state.name(), error = %e, "Handshake aborted");
            self.state = HandshakeState::Failed;
        }
        result
    }

    fn process_record(&mut self, record: &Record) -> Result<Vec<Record>> {
        let payload = match &mut self.state {
            HandshakeState::ClientFinishedSent {
                records,
                server_ccs: true,
                ..
            } => records.open(Direction::ServerToClient, record)?,
            _ => Zeroizing::new(record.fragment.clone()),
        };

        match record.content_type {
            ContentType::Alert => Err(decode_alert(&payload)),
            ContentType::ChangeCipherSpec => {
                self.on_change_cipher_spec(&payload)?;
                Ok(Vec::new())
            }
            ContentType::Handshake => {
                self.deframer.push(&payload);
                let mut outgoing = Vec::new();
                while let Some(message) = self.deframer.pop()? {
                    outgoing.extend(self.on_message(&message)?);
                }
                Ok(outgoing)
            }
            ContentType::ApplicationData => Err(Error::UnexpectedMessage {
                expected: self.state.expected_name(),
                got: "ApplicationData",
            }),
        }
    }

    fn on_message(&mut self, bytes: &[u8]) -> Result<Vec<Record>> {
        let message = HandshakeMessage::parse(bytes)?;
        if self.state.expected_message() != Some(message.handshake_type()) {
            return Err(Error::UnexpectedMessage {
                expected: self.state.expected_name(),
                got: message.name(),
            });
        }

        match message {
            HandshakeMessage::ServerHello {
                version,
                random,
                cipher_suite,
                compression_method,
                ..
            } => {
                self.on_server_hello(version, random, cipher_suite, compression_method)?;
                self.transcript.append(bytes);
                Ok(Vec::new())
            }
            HandshakeMessage::Certificate { chain } => {
                self.on_certificate(&chain)?;
                self.transcript.append(bytes);
                Ok(Vec::new())
            }
            HandshakeMessage::ServerKeyExchange {
                named_group,
                public_key,
                signature_scheme,
                ..
            } => {
                self.on_server_key_exchange(named_group, &public_key, signature_scheme)?;
                self.transcript.append(bytes);
                Ok(Vec::new())
            }
            HandshakeMessage::ServerHelloDone => {
                self.on_server_hello_done()?;
                self.transcript.append(bytes);
                self.derive_keys()?;
                let client_key_exchange = self.send_client_key_exchange()?;
                let mut flight = vec![client_key_exchange];
                flight.extend(self.send_client_finished()?);
                Ok(flight)
            }
            HandshakeMessage::Finished { verify_data } => {
                self.on_server_finished(&verify_data)?;
                Ok(Vec::new())
            }
            other => Err(Error::UnexpectedMessage {
                expected: self.state.expected_name(),
                got: other.name(),
            }),
        }
    }

    // === Server flight ===

    fn on_server_hello(
        &mut self,
        version: u16,
        server_random: [u8; 32],
        cipher_suite: u16,
        compression_method: u8,
    ) -> Result<()> {
        let (client_random, keypair) =
            match std::mem::replace(&mut self.state, HandshakeState::Failed) {
                HandshakeState::HelloSent {
                    client_random,
                    keypair,
                } => (client_random, keypair),
                old_state => {
                    self.state = old_state;
                    return Err(Error::InvalidState("ServerHello outside HelloSent"));
                }
            };

        if version != TLS12_VERSION {
            return Err(Error::Protocol(format!(
                "Server selected version 0x{:04X}",
                version
            )));
        }
        if CipherSuite::from_u16(cipher_suite) != Some(CipherSuite::EcdheRsaAes128GcmSha256) {
            return Err(Error::Protocol(format!(
                "Server selected cipher suite 0x{:04X} which was not offered",
                cipher_suite
            )));
        }
        if compression_method != 0 {
            return Err(Error::Protocol(format!(
                "Server selected compression method {}",
                compression_method
            )));
        }

        self.state = HandshakeState::ServerHelloReceived {
            client_random,
            server_random,
            keypair,
        };
        tracing::debug!(cipher_suite, "ServerHello received");
        Ok(())
    }

    fn on_certificate(&mut self, chain: &[Vec<u8>]) -> Result<()> {
        let (client_random, server_random, keypair) =
            match std::mem::replace(&mut self.state, HandshakeState::Failed) {
                HandshakeState::ServerHelloReceived {
                    client_random,
                    server_random,
                    keypair,
                } => (client_random, server_random, keypair),
                old_state => {
                    self.state = old_state;
                    return Err(Error::InvalidState("Certificate outside ServerHelloReceived"));
                }
            };

        self.verifier.verify(&self.server_name, chain)?;

        self.state = HandshakeState::CertificateReceived {
            client_random,
            server_random,
            keypair,
        };
        tracing::debug!(certificates = chain.len(), "Certificate received");
        Ok(())
    }

    fn on_server_key_exchange(
        &mut self,
        named_group: u16,
        public_key: &[u8],
        signature_scheme: u16,
    ) -> Result<()> {
        let (client_random, server_random, keypair) =
            match std::mem::replace(&mut self.state, HandshakeState::Failed) {
                HandshakeState::CertificateReceived {
                    client_random,
                    server_random,
                    keypair,
                } => (client_random, server_random, keypair),
                old_state => {
                    self.state = old_state;
                    return Err(Error::InvalidState(
                        "ServerKeyExchange outside CertificateReceived",
                    ));
                }
            };

        if named_group != NAMED_GROUP_X25519 {
            return Err(Error::Protocol(format!(
                "Server selected group 0x{:04X}, only x25519 was offered",
                named_group
            )));
        }
        let server_public = parse_public_key(public_key).map_err(|_| {
            Error::Protocol(format!(
                "x25519 public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                public_key.len()
            ))
        })?;

        tracing::warn!(
            signature_scheme,
            "ServerKeyExchange signature NOT verified - parameters are unauthenticated"
        );

        self.state = HandshakeState::ServerKeyExchangeReceived {
            client_random,
            server_random,
            keypair,
            server_public,
        };
        Ok(())
    }

    fn on_server_hello_done(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, HandshakeState::Failed) {
            HandshakeState::ServerKeyExchangeReceived {
                client_random,
                server_random,
                keypair,
                server_public,
            } => {
                self.state = HandshakeState::ServerDoneReceived {
                    client_random,
                    server_random,
                    keypair,
                    server_public,
                };
                tracing::debug!("ServerHelloDone received");
                Ok(())
            }
            old_state => {
                self.state = old_state;
                Err(Error::InvalidState(
                    "ServerHelloDone outside ServerKeyExchangeReceived",
                ))
            }
        }
    }

    // === Client flight ===

    fn derive_keys(&mut self) -> Result<()> {
        let (client_random, server_random, keypair, server_public) =
            match std::mem::replace(&mut self.state, HandshakeState::Failed) {
                HandshakeState::ServerDoneReceived {
                    client_random,
                    server_random,
                    keypair,
                    server_public,
                } => (client_random, server_random, keypair, server_public),
                old_state => {
                    self.state = old_state;
                    return Err(Error::InvalidState("key schedule outside ServerDoneReceived"));
                }
            };

        let client_public = *keypair.public_key();
        let keys = KeyMaterial::derive(keypair, &server_public, &client_random, &server_random)?;

        self.state = HandshakeState::KeysDerived {
            keys,
            client_public,
        };
        tracing::debug!("Keys derived");
        Ok(())
    }

    fn send_client_key_exchange(&mut self) -> Result<Record> {
        let (keys, client_public) =
            match std::mem::replace(&mut self.state, HandshakeState::Failed) {
                HandshakeState::KeysDerived {
                    keys,
                    client_public,
                } => (keys, client_public),
                old_state => {
                    self.state = old_state;
                    return Err(Error::InvalidState("ClientKeyExchange outside KeysDerived"));
                }
            };

        let message = HandshakeMessage::ClientKeyExchange {
            public_key: client_public,
        }
        .serialize()?;
        self.transcript.append(&message);

        self.state = HandshakeState::ClientKeyExchangeSent { keys };
        tracing::debug!("ClientKeyExchange sent");
        Ok(Record::new(ContentType::Handshake, message))
    }

    /// ChangeCipherSpec followed by the encrypted Finished.
    fn send_client_finished(&mut self) -> Result<Vec<Record>> {
        let keys = match std::mem::replace(&mut self.state, HandshakeState::Failed) {
            HandshakeState::ClientKeyExchangeSent { keys } => keys,
            old_state => {
                self.state = old_state;
                return Err(Error::InvalidState("Finished outside ClientKeyExchangeSent"));
            }
        };

        let change_cipher_spec = Record::new(
            ContentType::ChangeCipherSpec,
            CHANGE_CIPHER_SPEC.to_vec(),
        );

        // Both sequence counters start over here.
        let mut records = RecordLayer::new(&keys);

        let verify_data = keys.client_finished(&self.transcript.hash())?;
        let finished = HandshakeMessage::Finished { verify_data }.serialize()?;
        self.transcript.append(&finished);
        let sealed = records.seal(Direction::ClientToServer, ContentType::Handshake, &finished)?;

        self.state = HandshakeState::ClientFinishedSent {
            keys,
            records,
            server_ccs: false,
        };
        tracing::debug!("ChangeCipherSpec and Finished sent");
        Ok(vec![change_cipher_spec, sealed])
    }

    // === Server ChangeCipherSpec / Finished ===

    fn on_change_cipher_spec(&mut self, payload: &[u8]) -> Result<()> {
        match &mut self.state {
            HandshakeState::ClientFinishedSent { server_ccs, .. } if !*server_ccs => {
                if payload != CHANGE_CIPHER_SPEC {
                    return Err(Error::Protocol("Malformed ChangeCipherSpec".into()));
                }
                if !self.deframer.is_empty() {
                    return Err(Error::Protocol(
                        "ChangeCipherSpec inside a fragmented handshake message".into(),
                    ));
                }
                *server_ccs = true;
                tracing::debug!("Server ChangeCipherSpec received");
                Ok(())
            }
            other => Err(Error::UnexpectedMessage {
                expected: other.expected_name(),
                got: "ChangeCipherSpec",
            }),
        }
    }

    fn on_server_finished(&mut self, verify_data: &[u8]) -> Result<()> {
        let (keys, records) = match std::mem::replace(&mut self.state, HandshakeState::Failed) {
            HandshakeState::ClientFinishedSent {
                keys,
                records,
                server_ccs: true,
            } => (keys, records),
            old_state => {
                self.state = old_state;
                return Err(Error::InvalidState("Finished outside ClientFinishedSent"));
            }
        };

        let expected = keys.server_finished(&self.transcript.hash())?;
        if !bool::from(expected[..].ct_eq(verify_data)) {
            return Err(Error::VerificationFailure);
        }

        self.state = HandshakeState::Established { records };
        tracing::debug!("Server Finished verified, handshake established");
        Ok(())
    }
}

impl std::fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("server_name", &self.server_name)
            .field("state", &self.state.name())
            .field("transcript_len", &self.transcript.len())
            .finish()
    }
}
