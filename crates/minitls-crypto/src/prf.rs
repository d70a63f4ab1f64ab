//! TLS 1.2 pseudo-random function and derivations built on it (RFC 5246 §5, §8.1, §6.3, §7.4.9).
//!
//! The PRF for every TLS 1.2 suite defined after RFC 5246 that does not name
//! its own hash is P_SHA256:
//!
//! ```text
//! PRF(secret, label, seed) = P_SHA256(secret, label || seed)
//! P_SHA256(secret, seed)   = HMAC(secret, A(1) || seed) || HMAC(secret, A(2) || seed) || ...
//! A(0) = seed, A(i) = HMAC(secret, A(i-1))
//! ```

use crate::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Master secret length (RFC 5246 §8.1).
pub const MASTER_SECRET_LEN: usize = 48;

/// Finished verify_data length for TLS 1.2 suites.
pub const VERIFY_DATA_LEN: usize = 12;

/// SHA-256 output length.
pub const HASH_LEN: usize = 32;

/// Label for the master secret derivation.
pub const LABEL_MASTER_SECRET: &[u8] = b"master secret";

/// Label for the key block expansion.
pub const LABEL_KEY_EXPANSION: &[u8] = b"key expansion";

/// Label for the Finished message sent by the client.
pub const LABEL_CLIENT_FINISHED: &[u8] = b"client finished";

/// Label for the Finished message sent by the server.
pub const LABEL_SERVER_FINISHED: &[u8] = b"server finished";

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; HASH_LEN] {
    Sha256::digest(data).into()
}

fn hmac_sha256(secret: &[u8], parts: &[&[u8]]) -> Result<[u8; HASH_LEN]> {
    // HMAC accepts keys of any length; the error arm is unreachable in practice.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .map_err(|_| Error::KeyDerivation("HMAC-SHA256 rejected the PRF secret".into()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

/// TLS 1.2 PRF with P_SHA256.
///
/// # Arguments
/// * `secret` - PRF secret (pre-master secret or master secret)
/// * `label` - ASCII label, without a trailing NUL
/// * `seed` - Seed bytes
/// * `output_len` - Number of bytes to produce
///
/// # Example
/// ```
/// use minitls_crypto::prf::prf_sha256;
///
/// let out = prf_sha256(b"secret", b"test label", b"seed", 100).unwrap();
/// assert_eq!(out.len(), 100);
/// ```
pub fn prf_sha256(
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    output_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut output = Zeroizing::new(Vec::with_capacity(output_len + HASH_LEN));

    // A(1) = HMAC(secret, label || seed)
    let mut a = hmac_sha256(secret, &[label, seed])?;

    while output.len() < output_len {
        let block = hmac_sha256(secret, &[&a[..], label, seed])?;
        output.extend_from_slice(&block);
        a = hmac_sha256(secret, &[&a[..]])?;
    }

    output.truncate(output_len);
    Ok(output)
}

/// Derive the 48-byte master secret (RFC 5246 §8.1).
///
/// Seed: `client_random || server_random`.
pub fn derive_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Zeroizing<[u8; MASTER_SECRET_LEN]>> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);

    let okm = prf_sha256(pre_master_secret, LABEL_MASTER_SECRET, &seed, MASTER_SECRET_LEN)?;

    let mut master_secret = Zeroizing::new([0u8; MASTER_SECRET_LEN]);
    master_secret.copy_from_slice(&okm);
    Ok(master_secret)
}

/// Expand the master secret into a key block (RFC 5246 §6.3).
///
/// Seed: `server_random || client_random` (note the reversed order
/// relative to the master secret derivation).
pub fn derive_key_block(
    master_secret: &[u8; MASTER_SECRET_LEN],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    key_block_len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(server_random);
    seed[32..].copy_from_slice(client_random);

    prf_sha256(master_secret, LABEL_KEY_EXPANSION, &seed, key_block_len)
}

/// Compute Finished verify_data (RFC 5246 §7.4.9).
///
/// `handshake_hash` is SHA-256 over every handshake message exchanged so far.
pub fn finished_verify_data(
    master_secret: &[u8; MASTER_SECRET_LEN],
    label: &[u8],
    handshake_hash: &[u8; HASH_LEN],
) -> Result<[u8; VERIFY_DATA_LEN]> {
    let okm = prf_sha256(master_secret, label, handshake_hash, VERIFY_DATA_LEN)?;

    let mut verify_data = [0u8; VERIFY_DATA_LEN];
    verify_data.copy_from_slice(&okm);
    Ok(verify_data)
}
