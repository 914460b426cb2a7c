//! Project configuration (`.vaultpass.toml`).

pub mod settings;

pub use settings::{FailurePolicy, Settings};
