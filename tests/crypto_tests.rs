//! Integration tests for the VaultPass crypto module.

use vaultpass::crypto::encryption::{decrypt, encrypt, NONCE_LEN};
use vaultpass::crypto::envelope;
use vaultpass::crypto::kdf::MIN_MEMORY_KIB;
use vaultpass::crypto::{
    decrypt_legacy, derive_master_key_with_params, generate_salt, make_data_key, unwrap_data_key,
    verify_password, Argon2Params, MasterKey, MasterKeyHash, SealedSecret,
};
use vaultpass::errors::CryptoError;

fn fast() -> Argon2Params {
    Argon2Params {
        memory_kib: MIN_MEMORY_KIB,
        iterations: 1,
        parallelism: 1,
    }
}

// ---------------------------------------------------------------------------
// Authenticated encryption
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = [0xABu8; 32];
    let plaintext = b"correct horse battery staple";

    let ciphertext = encrypt(&key, plaintext).expect("encrypt should succeed");

    // 12-byte nonce + 16-byte tag on top of the plaintext.
    assert_eq!(ciphertext.len(), plaintext.len() + 28);

    let recovered = decrypt(&key, &ciphertext).expect("decrypt should succeed");
    assert_eq!(recovered, plaintext);
}

#[test]
fn encrypt_produces_different_ciphertext_each_time() {
    let key = [0xCDu8; 32];

    let ct1 = encrypt(&key, b"hunter2").expect("encrypt 1");
    let ct2 = encrypt(&key, b"hunter2").expect("encrypt 2");

    assert_ne!(ct1, ct2, "two encryptions of the same plaintext must differ");
}

#[test]
fn tampering_and_truncation_are_authentication_failures() {
    let key = [0xBBu8; 32];
    let mut ciphertext = encrypt(&key, b"pin=0000").expect("encrypt");

    assert_eq!(
        decrypt(&key, &ciphertext[..10]),
        Err(CryptoError::AuthenticationFailed)
    );

    ciphertext[15] ^= 0xFF;
    assert_eq!(
        decrypt(&key, &ciphertext),
        Err(CryptoError::AuthenticationFailed)
    );
}

// ---------------------------------------------------------------------------
// Key derivation (Argon2id)
// ---------------------------------------------------------------------------

#[test]
fn derivation_is_deterministic_per_salt() {
    let salt = generate_salt();
    let a = derive_master_key_with_params(b"passphrase", &salt, &fast()).expect("derive 1");
    let b = derive_master_key_with_params(b"passphrase", &salt, &fast()).expect("derive 2");
    assert_eq!(a, b);

    let other = derive_master_key_with_params(b"passphrase", &generate_salt(), &fast())
        .expect("derive 3");
    assert_ne!(a, other, "different salts must produce different keys");
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[test]
fn data_key_only_unwraps_under_its_master_key() {
    let k1 = MasterKey::new([1u8; 32]);
    let k2 = MasterKey::new([2u8; 32]);

    let (wrapped, data_key) = make_data_key(&k1).expect("make data key");
    let unwrapped = unwrap_data_key(&wrapped, &k1).expect("unwrap");
    assert_eq!(unwrapped.as_bytes(), data_key.as_bytes());

    assert_eq!(
        unwrap_data_key(&wrapped, &k2).unwrap_err(),
        CryptoError::AuthenticationFailed
    );
}

#[test]
fn sealed_secret_roundtrip() {
    let master = MasterKey::new([9u8; 32]);
    let sealed = SealedSecret::seal(b"s3cr3t", &master).expect("seal");

    let data_key = unwrap_data_key(&sealed.data_key_wrapped, &master).expect("unwrap");
    let plaintext = envelope::decrypt(&sealed.cipher_text, &data_key).expect("decrypt");
    assert_eq!(plaintext.as_slice(), b"s3cr3t");
}

#[test]
fn legacy_payload_decrypts_under_master_key() {
    let master = MasterKey::new([4u8; 32]);

    // A legacy row stores the nonce in its own iv column.
    let combined = encrypt(master.as_bytes(), b"old-format").expect("encrypt");
    let (iv, cipher_text) = combined.split_at(NONCE_LEN);

    let plaintext = decrypt_legacy(cipher_text, iv, &master).expect("legacy decrypt");
    assert_eq!(plaintext.as_slice(), b"old-format");

    let wrong = MasterKey::new([5u8; 32]);
    assert!(decrypt_legacy(cipher_text, iv, &wrong).is_err());
}

// ---------------------------------------------------------------------------
// Master key hash
// ---------------------------------------------------------------------------

#[test]
fn verify_password_against_stored_hash() {
    let (hash, _) = MasterKeyHash::generate(b"old1234", &fast()).expect("generate");
    let stored = hash.encode();

    assert_eq!(verify_password(b"old1234", &stored), Ok(true));
    assert_eq!(verify_password(b"new5678", &stored), Ok(false));
}

#[test]
fn verify_password_fails_closed_on_garbage() {
    assert_eq!(verify_password(b"anything", ""), Ok(false));
    assert_eq!(verify_password(b"anything", "$2y$10$abcdefg"), Ok(false));
}

#[test]
fn damaged_hash_is_a_distinct_error() {
    let (hash, _) = MasterKeyHash::generate(b"pw", &fast()).expect("generate");
    let damaged = hash.encode().replace("t=1", "t=x");

    assert!(matches!(
        verify_password(b"pw", &damaged),
        Err(CryptoError::CorruptHash(_))
    ));
}

#[test]
fn hash_records_kdf_params() {
    let (hash, key) = MasterKeyHash::generate(b"pw", &fast()).expect("generate");
    let decoded = MasterKeyHash::decode(&hash.encode()).expect("decode");

    assert_eq!(decoded.params(), &fast());
    let unlocked = decoded.unlock(b"pw").expect("unlock").expect("password matches");
    assert_eq!(unlocked.as_bytes(), key.as_bytes());
}
