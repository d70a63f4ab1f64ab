//! Handshake message codec (RFC 5246 §7.4, RFC 8422 §5).
//!
//! Implements the messages of a full ECDHE handshake with exact wire formats:
//! - Client flight (ClientHello, ClientKeyExchange, Finished)
//! - Server flight (ServerHello, Certificate, ServerKeyExchange, ServerHelloDone, Finished)
//! - Reassembly of handshake messages from record fragments
//!
//! Every message is `type(1) || length(3) || body`; all integers are big-endian.

use crate::{Error, Result};
use minitls_crypto::kex::{NAMED_GROUP_X25519, PUBLIC_KEY_LEN};
use minitls_crypto::prf::VERIFY_DATA_LEN;

/// Handshake message header length (type + 24-bit length).
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Protocol version carried in hellos and record headers (TLS 1.2).
pub const TLS12_VERSION: u16 = 0x0303;

// Handshake type identifiers (1 byte)
/// ClientHello (1).
pub const TYPE_CLIENT_HELLO: u8 = 1;
/// ServerHello (2).
pub const TYPE_SERVER_HELLO: u8 = 2;
/// Certificate (11).
pub const TYPE_CERTIFICATE: u8 = 11;
/// ServerKeyExchange (12).
pub const TYPE_SERVER_KEY_EXCHANGE: u8 = 12;
/// ServerHelloDone (14).
pub const TYPE_SERVER_HELLO_DONE: u8 = 14;
/// ClientKeyExchange (16).
pub const TYPE_CLIENT_KEY_EXCHANGE: u8 = 16;
/// Finished (20).
pub const TYPE_FINISHED: u8 = 20;

// Extension identifiers (2 bytes)
/// server_name (RFC 6066).
pub const EXT_SERVER_NAME: u16 = 0x0000;
/// supported_groups (RFC 8422).
pub const EXT_SUPPORTED_GROUPS: u16 = 0x000A;
/// ec_point_formats (RFC 8422).
pub const EXT_EC_POINT_FORMATS: u16 = 0x000B;
/// signature_algorithms (RFC 5246 §7.4.1.4.1).
pub const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000D;

/// ECCurveType.named_curve.
pub const CURVE_TYPE_NAMED: u8 = 3;

/// Signature schemes advertised in the ClientHello.
pub const SIGNATURE_SCHEMES: [u16; 4] = [
    0x0804, // rsa_pss_rsae_sha256
    0x0401, // rsa_pkcs1_sha256
    0x0403, // ecdsa_secp256r1_sha256
    0x0501, // rsa_pkcs1_sha384
];

const MAX_U24: usize = 0x00FF_FFFF;

/// Handshake messages per RFC 5246 §7.4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    /// ClientHello (§7.4.1.2).
    ClientHello {
        /// Client random (32 bytes).
        random: [u8; 32],
        /// Session ID (empty: resumption is not supported).
        session_id: Vec<u8>,
        /// Offered cipher suites.
        cipher_suites: Vec<u16>,
        /// Host name sent in the server_name extension.
        server_name: Option<String>,
    },

    /// ServerHello (§7.4.1.3).
    ServerHello {
        /// Negotiated protocol version.
        version: u16,
        /// Server random (32 bytes).
        random: [u8; 32],
        /// Session ID assigned by the server.
        session_id: Vec<u8>,
        /// Selected cipher suite.
        cipher_suite: u16,
        /// Selected compression method.
        compression_method: u8,
    },

    /// Certificate (§7.4.2): DER certificates, leaf first.
    Certificate {
        /// Certificate chain.
        chain: Vec<Vec<u8>>,
    },

    /// ServerKeyExchange for ECDHE suites (RFC 8422 §5.4).
    ServerKeyExchange {
        /// Named group of the ephemeral key.
        named_group: u16,
        /// Server ephemeral public key.
        public_key: Vec<u8>,
        /// Signature scheme over the parameters.
        signature_scheme: u16,
        /// Signature bytes (carried, not verified).
        signature: Vec<u8>,
    },

    /// ServerHelloDone (§7.4.5).
    ServerHelloDone,

    /// ClientKeyExchange for ECDHE suites (RFC 8422 §5.7).
    ClientKeyExchange {
        /// Client ephemeral X25519 public key.
        public_key: [u8; PUBLIC_KEY_LEN],
    },

    /// Finished (§7.4.9).
    Finished {
        /// PRF output over the transcript hash.
        verify_data: [u8; VERIFY_DATA_LEN],
    },
}

impl HandshakeMessage {
    /// Wire type identifier.
    pub fn handshake_type(&self) -> u8 {
        match self {
            HandshakeMessage::ClientHello { .. } => TYPE_CLIENT_HELLO,
            HandshakeMessage::ServerHello { .. } => TYPE_SERVER_HELLO,
            HandshakeMessage::Certificate { .. } => TYPE_CERTIFICATE,
            HandshakeMessage::ServerKeyExchange { .. } => TYPE_SERVER_KEY_EXCHANGE,
            HandshakeMessage::ServerHelloDone => TYPE_SERVER_HELLO_DONE,
            HandshakeMessage::ClientKeyExchange { .. } => TYPE_CLIENT_KEY_EXCHANGE,
            HandshakeMessage::Finished { .. } => TYPE_FINISHED,
        }
    }

    /// Human-readable message name for diagnostics.
    pub fn name(&self) -> &'static str {
        type_name(self.handshake_type())
    }

    /// Parse one complete handshake message (header included).
    pub fn parse(data: &[u8]) -> Result<Self> {
        check_len(data, HANDSHAKE_HEADER_LEN)?;

        let msg_type = data[0];
        let body_len = read_u24(&data[1..4]);
        let body = &data[HANDSHAKE_HEADER_LEN..];
        if body.len() != body_len {
            return Err(Error::Protocol(format!(
                "{} length mismatch: header says {}, got {}",
                type_name(msg_type),
                body_len,
                body.len()
            )));
        }

        let mut cursor = Cursor::new(body);
        let message = match msg_type {
            TYPE_CLIENT_HELLO => Self::parse_client_hello(&mut cursor)?,
            TYPE_SERVER_HELLO => Self::parse_server_hello(&mut cursor)?,
            TYPE_CERTIFICATE => Self::parse_certificate(&mut cursor)?,
            TYPE_SERVER_KEY_EXCHANGE => Self::parse_server_key_exchange(&mut cursor)?,
            TYPE_SERVER_HELLO_DONE => HandshakeMessage::ServerHelloDone,
            TYPE_CLIENT_KEY_EXCHANGE => Self::parse_client_key_exchange(&mut cursor)?,
            TYPE_FINISHED => HandshakeMessage::Finished {
                verify_data: cursor.array()?,
            },
            other => {
                return Err(Error::Protocol(format!(
                    "Unknown handshake message type 0x{:02X}",
                    other
                )))
            }
        };

        cursor.finish(type_name(msg_type))?;
        Ok(message)
    }

    /// Serialize to wire bytes, header included.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        match self {
            HandshakeMessage::ClientHello { .. } => self.serialize_client_hello(&mut body)?,
            HandshakeMessage::ServerHello { .. } => self.serialize_server_hello(&mut body)?,
            HandshakeMessage::Certificate { chain } => {
                let mut list = Vec::new();
                for cert in chain {
                    put_vec_u24(&mut list, cert)?;
                }
                put_vec_u24(&mut body, &list)?;
            }
            HandshakeMessage::ServerKeyExchange {
                named_group,
                public_key,
                signature_scheme,
                signature,
            } => {
                body.push(CURVE_TYPE_NAMED);
                body.extend_from_slice(&named_group.to_be_bytes());
                put_vec_u8(&mut body, public_key)?;
                body.extend_from_slice(&signature_scheme.to_be_bytes());
                put_vec_u16(&mut body, signature)?;
            }
            HandshakeMessage::ServerHelloDone => {}
            HandshakeMessage::ClientKeyExchange { public_key } => {
                put_vec_u8(&mut body, public_key)?;
            }
            HandshakeMessage::Finished { verify_data } => body.extend_from_slice(verify_data),
        }

        let mut buf = Vec::with_capacity(HANDSHAKE_HEADER_LEN + body.len());
        buf.push(self.handshake_type());
        put_vec_u24(&mut buf, &body)?;
        Ok(buf)
    }

    // === ClientHello ===

    fn parse_client_hello(cursor: &mut Cursor<'_>) -> Result<Self> {
        let version = cursor.u16()?;
        if version != TLS12_VERSION {
            return Err(Error::Protocol(format!(
                "ClientHello version 0x{:04X} not supported",
                version
            )));
        }
        let random = cursor.array()?;
        let session_id = cursor.vec_u8()?.to_vec();

        let suites = cursor.vec_u16()?;
        if suites.len() % 2 != 0 {
            return Err(Error::Protocol("Odd cipher suite list length".into()));
        }
        let cipher_suites = suites
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        let _compression_methods = cursor.vec_u8()?;

        let mut server_name = None;
        if !cursor.is_empty() {
            let mut extensions = Cursor::new(cursor.vec_u16()?);
            while !extensions.is_empty() {
                let ext_type = extensions.u16()?;
                let ext_data = extensions.vec_u16()?;
                if ext_type == EXT_SERVER_NAME {
                    server_name = Some(parse_server_name(ext_data)?);
                }
            }
        }

        Ok(HandshakeMessage::ClientHello {
            random,
            session_id,
            cipher_suites,
            server_name,
        })
    }

    fn serialize_client_hello(&self, body: &mut Vec<u8>) -> Result<()> {
        if let HandshakeMessage::ClientHello {
            random,
            session_id,
            cipher_suites,
            server_name,
        } = self
        {
            body.extend_from_slice(&TLS12_VERSION.to_be_bytes());
            body.extend_from_slice(random);
            put_vec_u8(body, session_id)?;

            let suites: Vec<u8> = cipher_suites.iter().flat_map(|s| s.to_be_bytes()).collect();
            put_vec_u16(body, &suites)?;

            // Compression methods: null only
            put_vec_u8(body, &[0])?;

            let mut extensions = Vec::new();
            if let Some(name) = server_name {
                // ServerNameList { NameType host_name(0), HostName }
                let mut entry = vec![0u8];
                put_vec_u16(&mut entry, name.as_bytes())?;
                let mut list = Vec::new();
                put_vec_u16(&mut list, &entry)?;
                put_extension(&mut extensions, EXT_SERVER_NAME, &list)?;
            }

            let mut groups = Vec::new();
            put_vec_u16(&mut groups, &NAMED_GROUP_X25519.to_be_bytes())?;
            put_extension(&mut extensions, EXT_SUPPORTED_GROUPS, &groups)?;

            // Point formats: uncompressed only
            put_extension(&mut extensions, EXT_EC_POINT_FORMATS, &[1, 0])?;

            let schemes: Vec<u8> = SIGNATURE_SCHEMES
                .iter()
                .flat_map(|s| s.to_be_bytes())
                .collect();
            let mut sig_algs = Vec::new();
            put_vec_u16(&mut sig_algs, &schemes)?;
            put_extension(&mut extensions, EXT_SIGNATURE_ALGORITHMS, &sig_algs)?;

            put_vec_u16(body, &extensions)?;
            Ok(())
        } else {
            Err(Error::Protocol("Wrong message type".into()))
        }
    }

    // === ServerHello ===

    fn parse_server_hello(cursor: &mut Cursor<'_>) -> Result<Self> {
        let version = cursor.u16()?;
        let random = cursor.array()?;
        let session_id = cursor.vec_u8()?.to_vec();
        if session_id.len() > 32 {
            return Err(Error::Protocol("ServerHello session ID too long".into()));
        }
        let cipher_suite = cursor.u16()?;
        let compression_method = cursor.u8()?;

        // Extensions are optional and none of them changes this client's behaviour.
        if !cursor.is_empty() {
            let mut extensions = Cursor::new(cursor.vec_u16()?);
            while !extensions.is_empty() {
                let _ext_type = extensions.u16()?;
                let _ext_data = extensions.vec_u16()?;
            }
        }

        Ok(HandshakeMessage::ServerHello {
            version,
            random,
            session_id,
            cipher_suite,
            compression_method,
        })
    }

    fn serialize_server_hello(&self, body: &mut Vec<u8>) -> Result<()> {
        if let HandshakeMessage::ServerHello {
            version,
            random,
            session_id,
            cipher_suite,
            compression_method,
        } = self
        {
            body.extend_from_slice(&version.to_be_bytes());
            body.extend_from_slice(random);
            put_vec_u8(body, session_id)?;
            body.extend_from_slice(&cipher_suite.to_be_bytes());
            body.push(*compression_method);
            Ok(())
        } else {
            Err(Error::Protocol("Wrong message type".into()))
        }
    }

    // === Certificate ===

    fn parse_certificate(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut list = Cursor::new(cursor.vec_u24()?);
        let mut chain = Vec::new();
        while !list.is_empty() {
            chain.push(list.vec_u24()?.to_vec());
        }
        Ok(HandshakeMessage::Certificate { chain })
    }

    // === ServerKeyExchange ===

    fn parse_server_key_exchange(cursor: &mut Cursor<'_>) -> Result<Self> {
        let curve_type = cursor.u8()?;
        if curve_type != CURVE_TYPE_NAMED {
            return Err(Error::Protocol(format!(
                "Unsupported ECCurveType {}",
                curve_type
            )));
        }
        let named_group = cursor.u16()?;
        let public_key = cursor.vec_u8()?.to_vec();
        let signature_scheme = cursor.u16()?;
        let signature = cursor.vec_u16()?.to_vec();

        Ok(HandshakeMessage::ServerKeyExchange {
            named_group,
            public_key,
            signature_scheme,
            signature,
        })
    }

    // === ClientKeyExchange ===

    fn parse_client_key_exchange(cursor: &mut Cursor<'_>) -> Result<Self> {
        let point = cursor.vec_u8()?;
        let public_key = point.try_into().map_err(|_| {
            Error::Protocol(format!(
                "ClientKeyExchange point must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                point.len()
            ))
        })?;
        Ok(HandshakeMessage::ClientKeyExchange { public_key })
    }
}

/// Name of a handshake type byte, for diagnostics.
pub fn type_name(msg_type: u8) -> &'static str {
    match msg_type {
        TYPE_CLIENT_HELLO => "ClientHello",
        TYPE_SERVER_HELLO => "ServerHello",
        TYPE_CERTIFICATE => "Certificate",
        TYPE_SERVER_KEY_EXCHANGE => "ServerKeyExchange",
        TYPE_SERVER_HELLO_DONE => "ServerHelloDone",
        TYPE_CLIENT_KEY_EXCHANGE => "ClientKeyExchange",
        TYPE_FINISHED => "Finished",
        _ => "unknown handshake message",
    }
}

fn parse_server_name(ext_data: &[u8]) -> Result<String> {
    let mut ext = Cursor::new(ext_data);
    let mut list = Cursor::new(ext.vec_u16()?);
    ext.finish("server_name extension")?;

    while !list.is_empty() {
        let name_type = list.u8()?;
        let name = list.vec_u16()?;
        if name_type == 0 {
            return String::from_utf8(name.to_vec())
                .map_err(|_| Error::Protocol("server_name is not valid UTF-8".into()));
        }
    }
    Err(Error::Protocol("server_name extension without host_name".into()))
}

/// Reassembles handshake messages from the payloads of handshake records.
///
/// Records may carry several messages, or a fraction of one; `pop` only
/// returns complete messages.
#[derive(Debug)]
pub struct HandshakeDeframer {
    buffer: Vec<u8>,
    max_message_len: usize,
}

impl HandshakeDeframer {
    /// Create a deframer rejecting message bodies longer than `max_message_len`.
    pub fn new(max_message_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_message_len,
        }
    }

    /// Append the payload of a handshake record.
    pub fn push(&mut self, fragment: &[u8]) {
        self.buffer.extend_from_slice(fragment);
    }

    /// Take the next complete message (header included), if buffered.
    pub fn pop(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() < HANDSHAKE_HEADER_LEN {
            return Ok(None);
        }

        let body_len = read_u24(&self.buffer[1..4]);
        if body_len > self.max_message_len {
            return Err(Error::Protocol(format!(
                "{} of {} bytes exceeds limit of {}",
                type_name(self.buffer[0]),
                body_len,
                self.max_message_len
            )));
        }

        let total = HANDSHAKE_HEADER_LEN + body_len;
        if self.buffer.len() < total {
            return Ok(None);
        }

        let rest = self.buffer.split_off(total);
        Ok(Some(std::mem::replace(&mut self.buffer, rest)))
    }

    /// True when no partial message is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

// === Wire helpers ===

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn is_empty(&self) -> bool {
        self.offset == self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        check_len(self.data, self.offset + n)?;
        let bytes = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn vec_u8(&mut self) -> Result<&'a [u8]> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    fn vec_u16(&mut self) -> Result<&'a [u8]> {
        let len = self.u16()? as usize;
        self.take(len)
    }

    fn vec_u24(&mut self) -> Result<&'a [u8]> {
        let len = read_u24(self.take(3)?);
        self.take(len)
    }

    fn finish(&self, what: &str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Protocol(format!(
                "{} has {} trailing bytes",
                what,
                self.data.len() - self.offset
            )))
        }
    }
}

fn check_len(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        Err(Error::InsufficientData(needed))
    } else {
        Ok(())
    }
}

#[inline]
fn read_u24(data: &[u8]) -> usize {
    ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | data[2] as usize
}

fn put_vec_u8(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u8::try_from(bytes.len())
        .map_err(|_| Error::Protocol(format!("{} bytes exceed u8 length", bytes.len())))?;
    buf.push(len);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn put_vec_u16(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| Error::Protocol(format!("{} bytes exceed u16 length", bytes.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn put_vec_u24(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    if bytes.len() > MAX_U24 {
        return Err(Error::Protocol(format!(
            "{} bytes exceed u24 length",
            bytes.len()
        )));
    }
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes()[1..]);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn put_extension(buf: &mut Vec<u8>, ext_type: u16, data: &[u8]) -> Result<()> {
    buf.extend_from_slice(&ext_type.to_be_bytes());
    put_vec_u16(buf, data)
}
