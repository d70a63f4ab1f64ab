//! Key schedule and Finished conformance tests.
//!
//! RFC 5246 §6.3 (key block), §7.4.9 (Finished) and §8.1 (master secret).

use minitls_core::key_schedule::{KeyMaterial, Transcript};
use minitls_crypto::kex::EphemeralKeyPair;
use minitls_crypto::prf::{prf_sha256, sha256};

const ALICE_PRIVATE: &str = "77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a";
const BOB_PRIVATE: &str = "5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb";
const SHARED: &str = "4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742";

fn keypair(private_hex: &str) -> EphemeralKeyPair {
    EphemeralKeyPair::from_private(hex::decode(private_hex).unwrap().try_into().unwrap())
}

fn randoms() -> ([u8; 32], [u8; 32]) {
    let client: [u8; 32] =
        hex::decode("0001020304050607080910111213141516171819202122232425262728293031")
            .unwrap()
            .try_into()
            .unwrap();
    let server: [u8; 32] =
        hex::decode("3130292827262524232221201918171615141312111009080706050403020100")
            .unwrap()
            .try_into()
            .unwrap();
    (client, server)
}

#[test]
fn test_master_secret_from_x25519_shared_secret() {
    let (client_random, server_random) = randoms();
    let client = keypair(ALICE_PRIVATE);
    let server_public = *keypair(BOB_PRIVATE).public_key();

    let keys = KeyMaterial::derive(client, &server_public, &client_random, &server_random).unwrap();

    // master_secret = PRF(pre_master_secret, "master secret", client_random || server_random)
    let pre_master_secret = hex::decode(SHARED).unwrap();
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(&server_random);
    let expected = prf_sha256(&pre_master_secret, b"master secret", &seed, 48).unwrap();

    assert_eq!(&keys.master_secret()[..], &expected[..]);
}

#[test]
fn test_key_block_partition() {
    let (client_random, server_random) = randoms();
    let pre_master_secret = hex::decode(SHARED).unwrap();

    let keys =
        KeyMaterial::from_pre_master_secret(&pre_master_secret, &client_random, &server_random)
            .unwrap();

    // key_block = PRF(master_secret, "key expansion", server_random || client_random)
    let mut seed = server_random.to_vec();
    seed.extend_from_slice(&client_random);
    let key_block = prf_sha256(keys.master_secret(), b"key expansion", &seed, 40).unwrap();

    assert_eq!(&keys.client_write_key()[..], &key_block[0..16]);
    assert_eq!(&keys.server_write_key()[..], &key_block[16..32]);
    assert_eq!(&keys.client_write_iv()[..], &key_block[32..36]);
    assert_eq!(&keys.server_write_iv()[..], &key_block[36..40]);
}

#[test]
fn test_both_roles_derive_identical_keys() {
    let (client_random, server_random) = randoms();
    let alice = keypair(ALICE_PRIVATE);
    let bob = keypair(BOB_PRIVATE);
    let alice_public = *alice.public_key();
    let bob_public = *bob.public_key();

    let client_keys = KeyMaterial::derive(alice, &bob_public, &client_random, &server_random).unwrap();
    let server_keys = KeyMaterial::derive(bob, &alice_public, &client_random, &server_random).unwrap();

    assert_eq!(client_keys.master_secret(), server_keys.master_secret());
    assert_eq!(client_keys.client_write_key(), server_keys.client_write_key());
    assert_eq!(client_keys.server_write_key(), server_keys.server_write_key());
    assert_eq!(client_keys.client_write_iv(), server_keys.client_write_iv());
    assert_eq!(client_keys.server_write_iv(), server_keys.server_write_iv());
}

#[test]
fn test_finished_verify_data() {
    let (client_random, server_random) = randoms();
    let pre_master_secret = hex::decode(SHARED).unwrap();
    let keys =
        KeyMaterial::from_pre_master_secret(&pre_master_secret, &client_random, &server_random)
            .unwrap();

    let mut transcript = Transcript::new();
    transcript.append(b"\x01\x00\x00\x00");
    transcript.append(b"\x02\x00\x00\x00");
    let hash = transcript.hash();
    assert_eq!(hash, sha256(b"\x01\x00\x00\x00\x02\x00\x00\x00"));

    // verify_data = PRF(master_secret, finished_label, Hash(handshake_messages))[0..12]
    let client = keys.client_finished(&hash).unwrap();
    let server = keys.server_finished(&hash).unwrap();
    let expected_client = prf_sha256(keys.master_secret(), b"client finished", &hash, 12).unwrap();
    let expected_server = prf_sha256(keys.master_secret(), b"server finished", &hash, 12).unwrap();

    assert_eq!(&client[..], &expected_client[..]);
    assert_eq!(&server[..], &expected_server[..]);
    assert_ne!(client, server);
}
