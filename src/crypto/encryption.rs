//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `decrypt` splits the nonce back out
//! before decrypting.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! Legacy records keep the nonce in a separate column, so
//! `decrypt_detached` takes it as its own argument.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::CryptoError;

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` with a 32-byte `key`.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    // Build the cipher from the raw key bytes.
    let cipher = cipher_for(key)?;

    // Generate a random 12-byte nonce.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // Encrypt and authenticate the plaintext.
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("encryption error: {e}")))?;

    // Prepend the nonce so the caller only needs to store one blob.
    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt data that was produced by `encrypt`.
///
/// Expects the first 12 bytes to be the nonce, followed by the ciphertext.
pub fn decrypt(key: &[u8], ciphertext_with_nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
    // Make sure we have at least a nonce and a tag worth of bytes.
    if ciphertext_with_nonce.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }

    // Split nonce from ciphertext.
    let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_LEN);
    decrypt_detached(key, nonce_bytes, ciphertext)
}

/// Decrypt a ciphertext whose nonce is stored separately.
pub fn decrypt_detached(
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    // A nonce of any other size was not written by us.
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::AuthenticationFailed);
    }

    // Build the cipher from the raw key bytes.
    let cipher = cipher_for(key)?;

    // Decrypt and verify the auth tag.
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Encrypt with a caller-chosen nonce, producing the detached legacy layout.
///
/// Only test fixtures write legacy records.
#[cfg(test)]
pub(crate) fn encrypt_detached(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    cipher_for(key)?
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(format!("encryption error: {e}")))
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_roundtrip() {
        let key = [0x21u8; 32];
        let nonce = [7u8; NONCE_LEN];
        let ct = encrypt_detached(&key, &nonce, b"legacy value").unwrap();
        let pt = decrypt_detached(&key, &nonce, &ct).unwrap();
        assert_eq!(pt, b"legacy value");
    }

    #[test]
    fn detached_rejects_short_nonce() {
        let key = [0x21u8; 32];
        let nonce = [7u8; NONCE_LEN];
        let ct = encrypt_detached(&key, &nonce, b"x").unwrap();
        assert_eq!(
            decrypt_detached(&key, &nonce[..8], &ct),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert_eq!(
            encrypt(&[0u8; 16], b"x"),
            Err(CryptoError::InvalidKeyLength(16))
        );
    }
}
