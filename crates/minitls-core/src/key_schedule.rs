//! Key schedule and handshake transcript.
//!
//! ```text
//! pre_master_secret = X25519(client_eph, server_eph)
//! master_secret     = PRF(pre_master_secret, "master secret", client_random || server_random)[0..48]
//! key_block         = PRF(master_secret, "key expansion", server_random || client_random)[0..40]
//!
//! key_block = client_write_key (16) || server_write_key (16)
//!          || client_write_iv (4)  || server_write_iv (4)
//! ```

use crate::{Error, Result};
use minitls_crypto::aead::{FIXED_IV_LEN, KEY_LEN};
use minitls_crypto::kex::{EphemeralKeyPair, PUBLIC_KEY_LEN};
use minitls_crypto::prf::{
    derive_key_block, derive_master_secret, finished_verify_data, sha256, HASH_LEN,
    LABEL_CLIENT_FINISHED, LABEL_SERVER_FINISHED, MASTER_SECRET_LEN, VERIFY_DATA_LEN,
};
use minitls_crypto::CipherSuite;
use zeroize::Zeroizing;

/// Secrets derived once per connection.
pub struct KeyMaterial {
    master_secret: Zeroizing<[u8; MASTER_SECRET_LEN]>,
    client_write_key: Zeroizing<[u8; KEY_LEN]>,
    server_write_key: Zeroizing<[u8; KEY_LEN]>,
    client_write_iv: Zeroizing<[u8; FIXED_IV_LEN]>,
    server_write_iv: Zeroizing<[u8; FIXED_IV_LEN]>,
}

impl KeyMaterial {
    /// Run the client side of the key schedule.
    ///
    /// Consumes the ephemeral key pair so it cannot be reused.
    pub fn derive(
        keypair: EphemeralKeyPair,
        server_public: &[u8; PUBLIC_KEY_LEN],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<Self> {
        let pre_master_secret = keypair.agree(server_public)?;
        Self::from_pre_master_secret(&pre_master_secret[..], client_random, server_random)
    }

    /// Derive everything from an already agreed pre-master secret.
    pub fn from_pre_master_secret(
        pre_master_secret: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<Self> {
        let master_secret = derive_master_secret(pre_master_secret, client_random, server_random)?;
        let key_block = derive_key_block(
            &master_secret,
            client_random,
            server_random,
            CipherSuite::EcdheRsaAes128GcmSha256.key_block_len(),
        )?;
        Self::from_key_block(master_secret, &key_block)
    }

    /// Partition a 40-byte key block.
    pub fn from_key_block(
        master_secret: Zeroizing<[u8; MASTER_SECRET_LEN]>,
        key_block: &[u8],
    ) -> Result<Self> {
        let expected = CipherSuite::EcdheRsaAes128GcmSha256.key_block_len();
        if key_block.len() != expected {
            return Err(Error::Crypto(minitls_crypto::Error::InvalidLength {
                expected,
                actual: key_block.len(),
            }));
        }

        let mut client_write_key = Zeroizing::new([0u8; KEY_LEN]);
        let mut server_write_key = Zeroizing::new([0u8; KEY_LEN]);
        let mut client_write_iv = Zeroizing::new([0u8; FIXED_IV_LEN]);
        let mut server_write_iv = Zeroizing::new([0u8; FIXED_IV_LEN]);

        let (keys, ivs) = key_block.split_at(2 * KEY_LEN);
        client_write_key.copy_from_slice(&keys[..KEY_LEN]);
        server_write_key.copy_from_slice(&keys[KEY_LEN..]);
        client_write_iv.copy_from_slice(&ivs[..FIXED_IV_LEN]);
        server_write_iv.copy_from_slice(&ivs[FIXED_IV_LEN..]);

        Ok(Self {
            master_secret,
            client_write_key,
            server_write_key,
            client_write_iv,
            server_write_iv,
        })
    }

    /// Master secret.
    pub fn master_secret(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.master_secret
    }

    /// Client write key.
    pub fn client_write_key(&self) -> &[u8; KEY_LEN] {
        &self.client_write_key
    }

    /// Server write key.
    pub fn server_write_key(&self) -> &[u8; KEY_LEN] {
        &self.server_write_key
    }

    /// Client fixed IV.
    pub fn client_write_iv(&self) -> &[u8; FIXED_IV_LEN] {
        &self.client_write_iv
    }

    /// Server fixed IV.
    pub fn server_write_iv(&self) -> &[u8; FIXED_IV_LEN] {
        &self.server_write_iv
    }

    /// verify_data for the client's Finished.
    pub fn client_finished(&self, handshake_hash: &[u8; HASH_LEN]) -> Result<[u8; VERIFY_DATA_LEN]> {
        Ok(finished_verify_data(
            &self.master_secret,
            LABEL_CLIENT_FINISHED,
            handshake_hash,
        )?)
    }

    /// verify_data for the server's Finished.
    pub fn server_finished(&self, handshake_hash: &[u8; HASH_LEN]) -> Result<[u8; VERIFY_DATA_LEN]> {
        Ok(finished_verify_data(
            &self.master_secret,
            LABEL_SERVER_FINISHED,
            handshake_hash,
        )?)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// Append-only record of every handshake message, in wire order.
///
/// ChangeCipherSpec is not a handshake message and never enters the
/// transcript.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    bytes: Vec<u8>,
}

impl Transcript {
    /// Empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one complete handshake message (header included).
    pub fn append(&mut self, message: &[u8]) {
        self.bytes.extend_from_slice(message);
    }

    /// SHA-256 over everything appended so far.
    pub fn hash(&self) -> [u8; HASH_LEN] {
        sha256(&self.bytes)
    }

    /// Number of bytes appended so far.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True before the first message.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
