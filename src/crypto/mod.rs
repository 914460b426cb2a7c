//! Cryptographic primitives for VaultPass.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id password-based key derivation (`kdf`)
//! - Master and data key types, HKDF wrapping key derivation (`keys`)
//! - Envelope encryption and the legacy read path (`envelope`)
//! - The stored master key hash and password verification (`master_hash`)

pub mod encryption;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod master_hash;

pub use envelope::{decrypt_legacy, make_data_key, unwrap_data_key, SealedSecret};
pub use kdf::{derive_master_key_with_params, generate_salt, Argon2Params};
pub use keys::{DataKey, MasterKey};
pub use master_hash::{verify_password, MasterKeyHash};
