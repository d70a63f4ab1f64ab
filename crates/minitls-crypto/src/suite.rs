//! The single cipher suite spoken by minitls.
//!
//! TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 (RFC 5289): X25519 ephemeral key
//! agreement, AES-128-GCM record protection, P_SHA256 PRF. AEAD suites have no
//! MAC keys, so the key block is just two write keys followed by two fixed IVs.

use crate::aead::{FIXED_IV_LEN, KEY_LEN};

/// Cipher suites known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CipherSuite {
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 (0xC02F).
    EcdheRsaAes128GcmSha256 = 0xC02F,
}

impl CipherSuite {
    /// Convert from wire format (u16).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0xC02F => Some(Self::EcdheRsaAes128GcmSha256),
            _ => None,
        }
    }

    /// Convert to wire format (u16).
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Write key length in bytes.
    pub fn key_len(&self) -> usize {
        KEY_LEN
    }

    /// Fixed (implicit) IV length in bytes.
    pub fn fixed_iv_len(&self) -> usize {
        FIXED_IV_LEN
    }

    /// Total key block length: 2 keys + 2 fixed IVs.
    pub fn key_block_len(&self) -> usize {
        2 * self.key_len() + 2 * self.fixed_iv_len()
    }
}
