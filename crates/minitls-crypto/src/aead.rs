//! AES-128-GCM record protection (NIST SP 800-38D, RFC 5288).
//!
//! TLS 1.2 GCM suites build the 12-byte nonce from a 4-byte implicit part
//! taken from the key block (the "salt" or write IV) and an 8-byte explicit
//! part that travels in front of every record.

use crate::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Nonce};
use zeroize::Zeroizing;

/// AES-128 key length in bytes.
pub const KEY_LEN: usize = 16;

/// Implicit (fixed) nonce part derived from the key block.
pub const FIXED_IV_LEN: usize = 4;

/// Explicit nonce part carried in each record.
pub const EXPLICIT_NONCE_LEN: usize = 8;

/// Full GCM nonce length.
pub const NONCE_LEN: usize = FIXED_IV_LEN + EXPLICIT_NONCE_LEN;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Construct the GCM nonce per RFC 5288 §3.
///
/// - `nonce[0:4] = fixed_iv` (client or server write IV)
/// - `nonce[4:12] = explicit_nonce` (sent on the wire)
///
/// # Example
/// ```
/// use minitls_crypto::aead::construct_nonce;
///
/// let nonce = construct_nonce(&[0xAA; 4], &7u64.to_be_bytes());
/// assert_eq!(&nonce[0..4], &[0xAA; 4]);
/// assert_eq!(&nonce[4..12], &[0, 0, 0, 0, 0, 0, 0, 7]);
/// ```
pub fn construct_nonce(
    fixed_iv: &[u8; FIXED_IV_LEN],
    explicit_nonce: &[u8; EXPLICIT_NONCE_LEN],
) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..FIXED_IV_LEN].copy_from_slice(fixed_iv);
    nonce[FIXED_IV_LEN..].copy_from_slice(explicit_nonce);
    nonce
}

/// Encrypt with AES-128-GCM.
///
/// # Arguments
/// * `key` - 16-byte write key
/// * `nonce` - 12-byte nonce (must be unique per key)
/// * `plaintext` - Data to encrypt
/// * `aad` - Additional authenticated data
///
/// # Returns
/// Ciphertext with appended 16-byte authentication tag.
///
/// # Example
/// ```
/// use minitls_crypto::aead::aes128gcm_encrypt;
///
/// let sealed = aes128gcm_encrypt(&[0x42; 16], &[0x01; 12], b"hello", b"hdr").unwrap();
/// assert_eq!(sealed.len(), 5 + 16);
/// ```
pub fn aes128gcm_encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new_from_slice(key)
        .map_err(|_| Error::Encryption("Invalid AES-128-GCM key length".into()))?;

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    cipher
        .encrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| Error::Encryption("AES-128-GCM encryption failed".into()))
}

/// Decrypt with AES-128-GCM.
///
/// Returns the plaintext wrapped in `Zeroizing` if the tag verifies.
///
/// # Errors
/// Returns `Error::Decryption` if tag verification fails. No plaintext is
/// released in that case.
pub fn aes128gcm_decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext_and_tag.len() < TAG_LEN {
        return Err(Error::InvalidLength {
            expected: TAG_LEN,
            actual: ciphertext_and_tag.len(),
        });
    }

    let cipher = Aes128Gcm::new_from_slice(key)
        .map_err(|_| Error::Decryption("Invalid AES-128-GCM key length".into()))?;

    let payload = Payload {
        msg: ciphertext_and_tag,
        aad,
    };

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), payload)
        .map_err(|_| Error::Decryption("AES-128-GCM authentication failed".into()))?;

    Ok(Zeroizing::new(plaintext))
}
