//! Key types and sub-key derivation.
//!
//! From a single master key we derive:
//! - A **wrapping key** (HKDF-SHA256) that protects every per-record data key.
//! - A **verification tag** (HMAC-SHA256) stored in the master key hash so a
//!   candidate password can be checked before it is trusted.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::CryptoError;

/// Length of every symmetric key in this crate (256 bits).
pub const KEY_LEN: usize = 32;

/// Length of the master key verification tag.
pub const TAG_LEN: usize = 32;

const WRAP_INFO: &[u8] = b"vaultpass-data-key-wrap";
const VERIFY_MESSAGE: &[u8] = b"vaultpass-master-verify";

/// A 32-byte master key, zeroed when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes.
    ///
    /// Legacy records were encrypted directly under these bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the key that wraps per-record data keys.
    pub fn wrapping_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
        let hk = Hkdf::<Sha256>::new(None, &self.bytes);
        let mut okm = Zeroizing::new([0u8; KEY_LEN]);
        hk.expand(WRAP_INFO, okm.as_mut())
            .map_err(|e| CryptoError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;
        Ok(okm)
    }

    /// Compute the tag stored alongside the salt in the master key hash.
    pub fn verification_tag(&self) -> Result<[u8; TAG_LEN], CryptoError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.bytes)
            .map_err(|e| CryptoError::KeyDerivationFailed(format!("HMAC init failed: {e}")))?;
        mac.update(VERIFY_MESSAGE);
        Ok(mac.finalize().into_bytes().into())
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// A random per-record data key, zeroed when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DataKey {
    bytes: [u8; KEY_LEN],
}

impl DataKey {
    /// Generate a fresh random data key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Rebuild a data key from unwrapped bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(bytes.len()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_key_differs_from_master() {
        let master = MasterKey::new([0x55u8; 32]);
        let wrap = master.wrapping_key().unwrap();
        assert_ne!(wrap.as_ref(), master.as_bytes());
    }

    #[test]
    fn verification_tag_is_deterministic() {
        let a = MasterKey::new([0x11u8; 32]).verification_tag().unwrap();
        let b = MasterKey::new([0x11u8; 32]).verification_tag().unwrap();
        let c = MasterKey::new([0x12u8; 32]).verification_tag().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn data_keys_are_random() {
        assert_ne!(DataKey::generate().as_bytes(), DataKey::generate().as_bytes());
    }

    #[test]
    fn data_key_rejects_short_slice() {
        assert_eq!(
            DataKey::from_slice(&[0u8; 16]).unwrap_err(),
            CryptoError::InvalidKeyLength(16)
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let master = MasterKey::new([0xAAu8; 32]);
        assert_eq!(format!("{master:?}"), "MasterKey([REDACTED])");
    }
}
