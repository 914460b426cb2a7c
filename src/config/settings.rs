use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::Argon2Params;
use crate::errors::{Result, VaultPassError};
use crate::rekey::transaction::CommitGranularity;

/// What a re-key run with failed records amounts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report the failures and succeed.
    #[default]
    Warn,
    /// Turn any failed record into an error.
    Strict,
}

/// Project-level configuration, loaded from `.vaultpass.toml`.
///
/// Every field has a default, so no config file is needed at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to the project root) holding the vault and
    /// audit databases.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Commit scope of a re-key run: `run`, `kind` or `record`.
    #[serde(default)]
    pub rekey_commit: CommitGranularity,

    #[serde(default)]
    pub rekey_failure_policy: FailurePolicy,

    /// Write operations and re-key events to `audit.db`.
    #[serde(default = "default_audit_log")]
    pub audit_log: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    ".vaultpass".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_audit_log() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            rekey_commit: CommitGranularity::default(),
            rekey_failure_policy: FailurePolicy::default(),
            audit_log: default_audit_log(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".vaultpass.toml";

    /// File name of the vault database inside the data directory.
    pub const DATABASE_FILE: &'static str = "vault.db";

    /// Load settings from `<project_dir>/.vaultpass.toml`.
    ///
    /// A missing file yields the defaults; a file that does not parse, or
    /// has unusable KDF parameters, is an error.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultPassError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        settings.argon2_params().validate().map_err(|e| {
            VaultPassError::ConfigError(format!("{}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// `project_dir/<data_dir>`
    pub fn data_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.data_dir)
    }

    /// `project_dir/<data_dir>/vault.db`
    pub fn database_path(&self, project_dir: &Path) -> PathBuf {
        self.data_path(project_dir).join(Self::DATABASE_FILE)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.data_dir, ".vaultpass");
        assert_eq!(s.argon2_memory_kib, 65_536);
        assert_eq!(s.argon2_iterations, 3);
        assert_eq!(s.argon2_parallelism, 4);
        assert_eq!(s.rekey_commit, CommitGranularity::Kind);
        assert_eq!(s.rekey_failure_policy, FailurePolicy::Warn);
        assert!(s.audit_log);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.data_dir, ".vaultpass");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
data_dir = "secrets"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 8
rekey_commit = "record"
rekey_failure_policy = "strict"
audit_log = false
"#;
        fs::write(tmp.path().join(".vaultpass.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.data_dir, "secrets");
        assert_eq!(settings.argon2_memory_kib, 131_072);
        assert_eq!(settings.argon2_iterations, 5);
        assert_eq!(settings.argon2_parallelism, 8);
        assert_eq!(settings.rekey_commit, CommitGranularity::Record);
        assert_eq!(settings.rekey_failure_policy, FailurePolicy::Strict);
        assert!(!settings.audit_log);
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".vaultpass.toml"), "rekey_commit = \"run\"\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.rekey_commit, CommitGranularity::Run);
        assert_eq!(settings.data_dir, ".vaultpass");
        assert_eq!(settings.argon2_iterations, 3);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".vaultpass.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(VaultPassError::ConfigError(_))));
    }

    #[test]
    fn load_rejects_unknown_commit_scope() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".vaultpass.toml"), "rekey_commit = \"never\"\n").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn load_rejects_weak_kdf_params() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".vaultpass.toml"), "argon2_memory_kib = 16\n").unwrap();
        assert!(matches!(
            Settings::load(tmp.path()),
            Err(VaultPassError::ConfigError(_))
        ));
    }

    #[test]
    fn database_path_respects_custom_data_dir() {
        let s = Settings {
            data_dir: "secrets".to_string(),
            ..Settings::default()
        };
        let project = Path::new("/home/user/myproject");
        assert_eq!(
            s.database_path(project),
            PathBuf::from("/home/user/myproject/secrets/vault.db")
        );
        assert_eq!(s.data_path(project), PathBuf::from("/home/user/myproject/secrets"));
    }
}
