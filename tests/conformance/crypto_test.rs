//! Cryptographic conformance tests.
//!
//! Published vectors for the primitives behind TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256.

use minitls_crypto::aead::{aes128gcm_decrypt, aes128gcm_encrypt, construct_nonce};
use minitls_crypto::kex::EphemeralKeyPair;
use minitls_crypto::prf::prf_sha256;

/// RFC 7748 §6.1 Diffie-Hellman vectors, both directions.
#[test]
fn test_rfc7748_vectors() {
    let alice_private: [u8; 32] =
        hex::decode("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a")
            .unwrap()
            .try_into()
            .unwrap();
    let bob_private: [u8; 32] =
        hex::decode("5dab087e624a8a4b79e17f8b83800ee66f3bb1292618b6fd1c2f8b27ff88e0eb")
            .unwrap()
            .try_into()
            .unwrap();
    let expected_shared =
        hex::decode("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742")
            .unwrap();

    let alice = EphemeralKeyPair::from_private(alice_private);
    let bob = EphemeralKeyPair::from_private(bob_private);

    assert_eq!(
        hex::encode(alice.public_key()),
        "8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
    );
    assert_eq!(
        hex::encode(bob.public_key()),
        "de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f"
    );

    let alice_public = *alice.public_key();
    let bob_public = *bob.public_key();

    let shared_a = alice.agree(&bob_public).unwrap();
    let shared_b = bob.agree(&alice_public).unwrap();

    assert_eq!(&shared_a[..], expected_shared.as_slice());
    assert_eq!(&shared_b[..], expected_shared.as_slice());
}

/// GCM specification Test Case 4 (AES-128, 60-byte plaintext, 20-byte AAD).
///
/// The 96-bit IV is split the way TLS 1.2 splits it: 4 fixed bytes and an
/// 8-byte explicit nonce.
#[test]
fn test_gcm_test_case_4() {
    let key: [u8; 16] = hex::decode("feffe9928665731c6d6a8f9467308308")
        .unwrap()
        .try_into()
        .unwrap();
    let fixed_iv: [u8; 4] = hex::decode("cafebabe").unwrap().try_into().unwrap();
    let explicit: [u8; 8] = hex::decode("facedbaddecaf888").unwrap().try_into().unwrap();
    let plaintext = hex::decode(
        "d9313225f88406e5a55909c5aff5269a86a7a9531534f7da2e4c303d8a318a72\
         1c3c0c95956809532fcf0e2449a6b525b16aedf5aa0de657ba637b39",
    )
    .unwrap();
    let aad = hex::decode("feedfacedeadbeeffeedfacedeadbeefabaddad2").unwrap();

    let nonce = construct_nonce(&fixed_iv, &explicit);
    let sealed = aes128gcm_encrypt(&key, &nonce, &plaintext, &aad).unwrap();

    assert_eq!(
        hex::encode(&sealed[..plaintext.len()]),
        "42831ec2217774244b7221b784d0d49ce3aa212f2c02a4e035c17e2329aca12e\
         21d514b25466931c7d8f6a5aac84aa051ba30b396a0aac973d58e091"
    );
    assert_eq!(
        hex::encode(&sealed[plaintext.len()..]),
        "5bc94fbc3221a5db94fae95ae7121a47"
    );

    let opened = aes128gcm_decrypt(&key, &nonce, &sealed, &aad).unwrap();
    assert_eq!(&opened[..], plaintext.as_slice());
}

/// TLS 1.2 PRF (P_SHA256) vector circulated on the IETF TLS list.
#[test]
fn test_prf_sha256_vector() {
    let secret = hex::decode("9bbe436ba940f017b17652849a71db35").unwrap();
    let seed = hex::decode("a0ba9f936cda311827a6f796ffd5198c").unwrap();

    let output = prf_sha256(&secret, b"test label", &seed, 100).unwrap();

    assert_eq!(
        hex::encode(&output[..]),
        "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
         6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
         4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
         87347b66"
    );
}
