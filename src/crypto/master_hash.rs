//! Stored master key hash.
//!
//! The hash lets a candidate master password be checked before it is
//! trusted to decrypt anything.  It is kept in the `config` table as text:
//!
//! ```text
//! $vaultpass$v=1$m=<kib>,t=<iterations>,p=<lanes>$<salt b64>$<tag b64>
//! ```
//!
//! `tag` is `HMAC-SHA256(master_key, "vaultpass-master-verify")`, so a
//! match proves the password derives the same master key.

use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use base64::Engine;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::kdf::{derive_master_key_with_params, generate_salt, Argon2Params, SALT_LEN};
use super::keys::{MasterKey, TAG_LEN};
use crate::errors::CryptoError;

const PREFIX: &str = "vaultpass";
const VERSION: u32 = 1;

/// Salt, KDF parameters and verification tag of the active master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterKeyHash {
    params: Argon2Params,
    salt: [u8; SALT_LEN],
    tag: [u8; TAG_LEN],
}

impl MasterKeyHash {
    /// Hash a new master password with a fresh salt.
    ///
    /// Returns the hash to persist and the derived key to use right away.
    pub fn generate(
        password: &[u8],
        params: &Argon2Params,
    ) -> Result<(Self, MasterKey), CryptoError> {
        let salt = generate_salt();
        let key = derive(password, &salt, params)?;
        let hash = Self {
            params: *params,
            salt,
            tag: key.verification_tag()?,
        };
        Ok((hash, key))
    }

    /// Derive the master key for `password` using this hash's salt and params.
    ///
    /// The key is not checked; see `unlock`.
    pub fn derive_key(&self, password: &[u8]) -> Result<MasterKey, CryptoError> {
        derive(password, &self.salt, &self.params)
    }

    /// Whether `key` is the key this hash was generated from.
    pub fn matches(&self, key: &MasterKey) -> Result<bool, CryptoError> {
        let tag = key.verification_tag()?;
        Ok(tag.ct_eq(&self.tag).into())
    }

    /// Derive and verify in one step. `None` means the password is wrong.
    pub fn unlock(&self, password: &[u8]) -> Result<Option<MasterKey>, CryptoError> {
        let key = self.derive_key(password)?;
        Ok(self.matches(&key)?.then_some(key))
    }

    pub fn params(&self) -> &Argon2Params {
        &self.params
    }

    pub fn encode(&self) -> String {
        format!(
            "${PREFIX}$v={VERSION}$m={},t={},p={}${}${}",
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            BASE64.encode(self.salt),
            BASE64.encode(self.tag),
        )
    }

    /// Parse the text form.
    ///
    /// Text that is not shaped like a vaultpass hash is `MalformedHash`;
    /// text with the right shape but bad contents is `CorruptHash`.
    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let parts: Vec<&str> = encoded.split('$').collect();
        let [empty, prefix, version, params, salt, tag] = parts.as_slice() else {
            return Err(CryptoError::MalformedHash);
        };
        if !empty.is_empty() || *prefix != PREFIX {
            return Err(CryptoError::MalformedHash);
        }
        let version = version
            .strip_prefix("v=")
            .ok_or(CryptoError::MalformedHash)?;
        if version != VERSION.to_string() {
            return Err(CryptoError::CorruptHash(format!(
                "unsupported version {version}"
            )));
        }

        let params = parse_params(params)?;
        params
            .validate()
            .map_err(|e| CryptoError::CorruptHash(e.to_string()))?;

        Ok(Self {
            params,
            salt: decode_fixed(salt, "salt")?,
            tag: decode_fixed(tag, "tag")?,
        })
    }
}

/// Check `password` against a stored hash.
///
/// Fails closed: unrecognisable input is `Ok(false)`.  Only a hash that is
/// recognisably ours but damaged is reported as an error.
pub fn verify_password(password: &[u8], stored: &str) -> Result<bool, CryptoError> {
    let hash = match MasterKeyHash::decode(stored) {
        Ok(hash) => hash,
        Err(CryptoError::MalformedHash) => return Ok(false),
        Err(e) => return Err(e),
    };
    Ok(hash.unlock(password)?.is_some())
}

fn derive(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    params: &Argon2Params,
) -> Result<MasterKey, CryptoError> {
    let mut bytes = derive_master_key_with_params(password, salt, params)?;
    let key = MasterKey::new(bytes);
    bytes.zeroize();
    Ok(key)
}

fn parse_params(text: &str) -> Result<Argon2Params, CryptoError> {
    let mut memory_kib = None;
    let mut iterations = None;
    let mut parallelism = None;

    for pair in text.split(',') {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| CryptoError::CorruptHash(format!("bad parameter '{pair}'")))?;
        let value: u32 = value
            .parse()
            .map_err(|_| CryptoError::CorruptHash(format!("bad value for '{name}'")))?;
        match name {
            "m" => memory_kib = Some(value),
            "t" => iterations = Some(value),
            "p" => parallelism = Some(value),
            other => {
                return Err(CryptoError::CorruptHash(format!(
                    "unknown parameter '{other}'"
                )))
            }
        }
    }

    match (memory_kib, iterations, parallelism) {
        (Some(memory_kib), Some(iterations), Some(parallelism)) => Ok(Argon2Params {
            memory_kib,
            iterations,
            parallelism,
        }),
        _ => Err(CryptoError::CorruptHash("missing KDF parameter".into())),
    }
}

fn decode_fixed<const N: usize>(text: &str, what: &str) -> Result<[u8; N], CryptoError> {
    let bytes = BASE64
        .decode(text)
        .map_err(|e| CryptoError::CorruptHash(format!("{what}: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::CorruptHash(format!("{what} must be {N} bytes, got {}", bytes.len()))
    })
}
