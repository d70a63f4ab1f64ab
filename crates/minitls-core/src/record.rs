//! Record layer (RFC 5246 §6.2) with AES-128-GCM protection (RFC 5288).
//!
//! Protected fragment layout:
//!
//! ```text
//! explicit_nonce (8) || ciphertext || tag (16)
//! ```
//!
//! Nonce: `fixed_iv (4) || explicit_nonce (8)`, the explicit part being the
//! big-endian sequence number of the record.
//!
//! AAD: `seq_num (8) || type (1) || version (2) || plaintext_len (2)`.

use crate::key_schedule::KeyMaterial;
use crate::message::TLS12_VERSION;
use crate::{Error, Result};
use minitls_crypto::aead::{
    aes128gcm_decrypt, aes128gcm_encrypt, construct_nonce, EXPLICIT_NONCE_LEN, FIXED_IV_LEN,
    KEY_LEN, TAG_LEN,
};
use zeroize::Zeroizing;

/// Record header length: type(1) + version(2) + length(2).
pub const RECORD_HEADER_LEN: usize = 5;

/// Maximum plaintext per record (2^14).
pub const MAX_PLAINTEXT_LEN: usize = 16_384;

/// Maximum protected fragment per record (2^14 + 2048).
pub const MAX_FRAGMENT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

/// AAD length for TLS 1.2 AEAD records.
pub const AAD_LEN: usize = 13;

/// Per-record expansion of a protected record.
pub const RECORD_OVERHEAD: usize = EXPLICIT_NONCE_LEN + TAG_LEN;

/// Record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    /// ChangeCipherSpec (20).
    ChangeCipherSpec = 20,
    /// Alert (21).
    Alert = 21,
    /// Handshake (22).
    Handshake = 22,
    /// ApplicationData (23).
    ApplicationData = 23,
}

impl ContentType {
    /// Convert from wire format.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            _ => None,
        }
    }

    /// Convert to wire format.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::ChangeCipherSpec => "ChangeCipherSpec",
            Self::Alert => "Alert",
            Self::Handshake => "Handshake",
            Self::ApplicationData => "ApplicationData",
        }
    }
}

/// Decoded 5-byte record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Content type of the fragment.
    pub content_type: ContentType,
    /// Record protocol version.
    pub version: u16,
    /// Fragment length.
    pub length: usize,
}

impl RecordHeader {
    /// Parse and validate a record header.
    ///
    /// Rejects unknown content types, non-TLS major versions and fragments
    /// larger than [`MAX_FRAGMENT_LEN`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_HEADER_LEN {
            return Err(Error::InsufficientData(RECORD_HEADER_LEN));
        }

        let content_type = ContentType::from_u8(data[0]).ok_or_else(|| {
            Error::Protocol(format!("Unknown record content type {}", data[0]))
        })?;
        let version = u16::from_be_bytes([data[1], data[2]]);
        if version >> 8 != 0x03 {
            return Err(Error::Protocol(format!(
                "Record version 0x{:04X} is not TLS",
                version
            )));
        }
        let length = u16::from_be_bytes([data[3], data[4]]) as usize;
        if length > MAX_FRAGMENT_LEN {
            return Err(Error::Protocol(format!(
                "Record fragment of {} bytes exceeds {}",
                length, MAX_FRAGMENT_LEN
            )));
        }

        Ok(Self {
            content_type,
            version,
            length,
        })
    }
}

/// One record as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Content type.
    pub content_type: ContentType,
    /// Record protocol version.
    pub version: u16,
    /// Fragment (plaintext before encryption is active, protected after).
    pub fragment: Vec<u8>,
}

impl Record {
    /// Build a TLS 1.2 record.
    pub fn new(content_type: ContentType, fragment: Vec<u8>) -> Self {
        Self {
            content_type,
            version: TLS12_VERSION,
            fragment,
        }
    }

    /// Parse one record from the front of `data`.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let header = RecordHeader::parse(data)?;
        let total = RECORD_HEADER_LEN + header.length;
        if data.len() < total {
            return Err(Error::InsufficientData(total));
        }

        let record = Self {
            content_type: header.content_type,
            version: header.version,
            fragment: data[RECORD_HEADER_LEN..total].to_vec(),
        };
        Ok((record, total))
    }

    /// Serialize header and fragment.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if self.fragment.len() > MAX_FRAGMENT_LEN {
            return Err(Error::Protocol(format!(
                "Record fragment of {} bytes exceeds {}",
                self.fragment.len(),
                MAX_FRAGMENT_LEN
            )));
        }

        let mut buf = Vec::with_capacity(RECORD_HEADER_LEN + self.fragment.len());
        buf.push(self.content_type.to_u8());
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.fragment);
        Ok(buf)
    }
}

/// Alert level: warning.
pub const ALERT_LEVEL_WARNING: u8 = 1;

/// Alert description: close_notify.
pub const ALERT_CLOSE_NOTIFY: u8 = 0;

/// Turn the payload of an alert record into the error it signals.
pub fn decode_alert(payload: &[u8]) -> Error {
    match payload {
        [level, description] => Error::PeerAlert {
            level: *level,
            description: *description,
        },
        _ => Error::Protocol(format!("Malformed alert of {} bytes", payload.len())),
    }
}

/// Traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client-write: records the client seals and the server opens.
    ClientToServer,
    /// Server-write: records the server seals and the client opens.
    ServerToClient,
}

/// Per-direction record sequence number.
///
/// The first record after a reset uses 0; every later record advances the
/// counter by one before using it. After `n > 0` records the counter
/// therefore reads `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceNumber {
    value: u64,
    fresh: bool,
}

impl SequenceNumber {
    /// Counter positioned before the first record.
    pub fn new() -> Self {
        Self {
            value: 0,
            fresh: true,
        }
    }

    #[cfg(test)]
    fn starting_at(value: u64) -> Self {
        Self {
            value,
            fresh: false,
        }
    }

    /// Sequence number of the most recently used record (0 before any).
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Sequence number to use for the next record.
    ///
    /// # Errors
    /// `Error::SequenceOverflow` once 2^64 - 1 has been used; the counter is
    /// never wrapped.
    pub fn next(&mut self) -> Result<u64> {
        if self.fresh {
            self.fresh = false;
        } else {
            self.value = self.value.checked_add(1).ok_or(Error::SequenceOverflow)?;
        }
        Ok(self.value)
    }
}

impl Default for SequenceNumber {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys and counter for one direction.
struct DirectionState {
    key: Zeroizing<[u8; KEY_LEN]>,
    fixed_iv: [u8; FIXED_IV_LEN],
    sequence: SequenceNumber,
}

impl DirectionState {
    fn new(key: &[u8; KEY_LEN], fixed_iv: &[u8; FIXED_IV_LEN]) -> Self {
        Self {
            key: Zeroizing::new(*key),
            fixed_iv: *fixed_iv,
            sequence: SequenceNumber::new(),
        }
    }
}

impl Drop for DirectionState {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.fixed_iv.zeroize();
    }
}

/// Build TLS 1.2 AEAD additional data.
pub fn build_aad(
    seq: u64,
    content_type: ContentType,
    version: u16,
    plaintext_len: usize,
) -> [u8; AAD_LEN] {
    let mut aad = [0u8; AAD_LEN];
    aad[0..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type.to_u8();
    aad[9..11].copy_from_slice(&version.to_be_bytes());
    aad[11..13].copy_from_slice(&(plaintext_len as u16).to_be_bytes());
    aad
}

/// Encryption state for both directions of an established connection.
///
/// Each side of a connection holds the same `RecordLayer`; the client seals
/// with [`Direction::ClientToServer`] and opens with
/// [`Direction::ServerToClient`], the server the reverse.
pub struct RecordLayer {
    client_write: DirectionState,
    server_write: DirectionState,
}

impl RecordLayer {
    /// Install fresh keys with both counters reset.
    pub fn new(keys: &KeyMaterial) -> Self {
        Self {
            client_write: DirectionState::new(keys.client_write_key(), keys.client_write_iv()),
            server_write: DirectionState::new(keys.server_write_key(), keys.server_write_iv()),
        }
    }

    fn state_mut(&mut self, direction: Direction) -> &mut DirectionState {
        match direction {
            Direction::ClientToServer => &mut self.client_write,
            Direction::ServerToClient => &mut self.server_write,
        }
    }

    /// Current sequence number of a direction.
    pub fn sequence(&self, direction: Direction) -> u64 {
        match direction {
            Direction::ClientToServer => self.client_write.sequence.value(),
            Direction::ServerToClient => self.server_write.sequence.value(),
        }
    }

    /// Protect `plaintext` as one record in `direction`.
    pub fn seal(
        &mut self,
        direction: Direction,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Record> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::Protocol(format!(
                "Plaintext of {} bytes exceeds record limit {}",
                plaintext.len(),
                MAX_PLAINTEXT_LEN
            )));
        }

        let state = self.state_mut(direction);
        let seq = state.sequence.next()?;
        let explicit_nonce = seq.to_be_bytes();
        let nonce = construct_nonce(&state.fixed_iv, &explicit_nonce);
        let aad = build_aad(seq, content_type, TLS12_VERSION, plaintext.len());

        let ciphertext = aes128gcm_encrypt(&state.key, &nonce, plaintext, &aad)?;

        let mut fragment = Vec::with_capacity(EXPLICIT_NONCE_LEN + ciphertext.len());
        fragment.extend_from_slice(&explicit_nonce);
        fragment.extend_from_slice(&ciphertext);

        Ok(Record::new(content_type, fragment))
    }

    /// Remove protection from a record received in `direction`.
    ///
    /// # Errors
    /// `Error::AuthenticationFailure` if the tag does not verify; no plaintext
    /// is returned in that case.
    pub fn open(&mut self, direction: Direction, record: &Record) -> Result<Zeroizing<Vec<u8>>> {
        let fragment = &record.fragment;
        if fragment.len() < RECORD_OVERHEAD {
            return Err(Error::Protocol(format!(
                "Protected record of {} bytes is shorter than nonce and tag",
                fragment.len()
            )));
        }
        let plaintext_len = fragment.len() - RECORD_OVERHEAD;
        if plaintext_len > MAX_PLAINTEXT_LEN {
            return Err(Error::Protocol("Record plaintext exceeds 2^14 bytes".into()));
        }

        let state = self.state_mut(direction);
        let seq = state.sequence.next()?;

        let mut explicit_nonce = [0u8; EXPLICIT_NONCE_LEN];
        explicit_nonce.copy_from_slice(&fragment[..EXPLICIT_NONCE_LEN]);
        let nonce = construct_nonce(&state.fixed_iv, &explicit_nonce);
        let aad = build_aad(seq, record.content_type, record.version, plaintext_len);

        aes128gcm_decrypt(&state.key, &nonce, &fragment[EXPLICIT_NONCE_LEN..], &aad)
            .map_err(|_| Error::AuthenticationFailure)
    }
}
