//! Envelope encryption.
//!
//! Every secret is encrypted under its own random data key; only the data
//! key is encrypted ("wrapped") under the master key.  Rotating the master
//! key therefore means re-wrapping, not re-encrypting bulk data.
//!
//! Records written before envelope encryption existed were encrypted
//! directly under the master key with a separately stored iv.  They can
//! be read through `decrypt_legacy` but are never written.

use zeroize::Zeroizing;

use super::encryption;
use super::keys::{DataKey, MasterKey};
use crate::errors::CryptoError;

/// A plaintext sealed under a fresh data key, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub cipher_text: Vec<u8>,
    pub data_key_wrapped: Vec<u8>,
}

impl SealedSecret {
    /// Mint a new data key under `master_key` and encrypt `plaintext` with it.
    pub fn seal(plaintext: &[u8], master_key: &MasterKey) -> Result<Self, CryptoError> {
        let (data_key_wrapped, data_key) = make_data_key(master_key)?;
        let cipher_text = encrypt(plaintext, &data_key)?;
        Ok(Self {
            cipher_text,
            data_key_wrapped,
        })
    }
}

/// Generate a random data key and wrap it under `master_key`.
///
/// Returns the wrapped form (to persist) and the raw key (to use now).
pub fn make_data_key(master_key: &MasterKey) -> Result<(Vec<u8>, DataKey), CryptoError> {
    let data_key = DataKey::generate();
    let wrapping_key = master_key.wrapping_key()?;
    let wrapped = encryption::encrypt(wrapping_key.as_ref(), data_key.as_bytes())?;
    Ok((wrapped, data_key))
}

/// Recover a data key wrapped by `make_data_key`.
///
/// Fails with `AuthenticationFailed` when `master_key` is not the key the
/// data key was wrapped under.
pub fn unwrap_data_key(wrapped: &[u8], master_key: &MasterKey) -> Result<DataKey, CryptoError> {
    let wrapping_key = master_key.wrapping_key()?;
    let raw = Zeroizing::new(encryption::decrypt(wrapping_key.as_ref(), wrapped)?);
    DataKey::from_slice(&raw)
}

/// Encrypt `plaintext` under a data key. The nonce travels inside the output.
pub fn encrypt(plaintext: &[u8], data_key: &DataKey) -> Result<Vec<u8>, CryptoError> {
    encryption::encrypt(data_key.as_bytes(), plaintext)
}

/// Decrypt an envelope payload.
pub fn decrypt(cipher_text: &[u8], data_key: &DataKey) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    encryption::decrypt(data_key.as_bytes(), cipher_text).map(Zeroizing::new)
}

/// Decrypt a legacy record encrypted directly under the master key.
pub fn decrypt_legacy(
    cipher_text: &[u8],
    iv: &[u8],
    master_key: &MasterKey,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    encryption::decrypt_detached(master_key.as_bytes(), iv, cipher_text).map(Zeroizing::new)
}

/// Build a legacy record payload: `(cipher_text, iv)`.
#[cfg(test)]
pub(crate) fn encrypt_legacy(
    plaintext: &[u8],
    master_key: &MasterKey,
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    use rand::RngCore;

    let mut iv = [0u8; encryption::NONCE_LEN];
    rand::rng().fill_bytes(&mut iv);
    let cipher_text = encryption::encrypt_detached(master_key.as_bytes(), &iv, plaintext)?;
    Ok((cipher_text, iv.to_vec()))
}
