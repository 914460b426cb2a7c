//! Password-based key derivation using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects against brute-force and
//! GPU-based attacks.  Parameters are configurable via `Argon2Params`
//! (loaded from `.vaultpass.toml` or sensible defaults) and are recorded
//! in the master key hash so a later unlock uses the same settings.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::errors::CryptoError;

/// Length of the salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the derived key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// Reject parameter sets that are too weak to be worth deriving with.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(CryptoError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < 1 {
            return Err(CryptoError::KeyDerivationFailed(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CryptoError::KeyDerivationFailed(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Derive a 32-byte master key with explicit Argon2id parameters.
///
/// The same password + salt + params will always produce the same key.
pub fn derive_master_key_with_params(
    password: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<[u8; KEY_LEN], CryptoError> {
    // Refuse dangerously weak settings before doing any work.
    argon2_params.validate()?;

    // Build Argon2id params with the requested output length.
    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    // Hash the password directly into the key buffer.
    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    // Fill from the thread-local CSPRNG.
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn rejects_weak_memory_cost() {
        let params = Argon2Params {
            memory_kib: 1024,
            ..fast()
        };
        let err = derive_master_key_with_params(b"pw", &generate_salt(), &params).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivationFailed(_)));
    }

    #[test]
    fn rejects_zero_iterations() {
        let params = Argon2Params {
            iterations: 0,
            ..fast()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn params_change_the_key() {
        let salt = generate_salt();
        let a = derive_master_key_with_params(b"pw", &salt, &fast()).unwrap();
        let b = derive_master_key_with_params(
            b"pw",
            &salt,
            &Argon2Params {
                iterations: 2,
                ..fast()
            },
        )
        .unwrap();
        assert_ne!(a, b);
    }
}
