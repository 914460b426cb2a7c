//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::errors::{Result, VaultPassError};
use crate::store::Database;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable holding the current master password.
pub const PASSWORD_ENV: &str = "VAULTPASS_PASSWORD";

/// Environment variable holding the new master password for `rekey`.
pub const NEW_PASSWORD_ENV: &str = "VAULTPASS_NEW_PASSWORD";

/// VaultPass CLI: local password vault with envelope encryption.
#[derive(Parser)]
#[command(
    name = "vaultpass",
    about = "Local password vault with envelope encryption",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (default: `data_dir` from .vaultpass.toml, else .vaultpass)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create the vault and choose a master password
    Init,

    /// Store an account password, or a custom field value of an account
    Set {
        /// Account name
        account: String,
        /// Value to store (omit for interactive prompt)
        value: Option<String>,
        /// Login to record with the account
        #[arg(long)]
        login: Option<String>,
        /// Store the value in this custom field instead of the password
        #[arg(long)]
        field: Option<String>,
    },

    /// Print an account password or custom field value
    Get {
        /// Account name
        account: String,
        /// Custom field to read instead of the password
        #[arg(long)]
        field: Option<String>,
    },

    /// List the archived passwords of an account
    History {
        /// Account name
        account: String,
    },

    /// Change the master password and re-key every secret
    Rekey,

    /// View the audit log of vault operations
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Where the current invocation reads and writes its data.
pub struct Context {
    pub settings: Settings,
    pub data_dir: PathBuf,
}

impl Context {
    /// Load `.vaultpass.toml` from the working directory and apply
    /// `--data-dir` on top of it.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let settings = Settings::load(&cwd)?;
        let data_dir = match &cli.data_dir {
            Some(dir) => cwd.join(dir),
            None => settings.data_path(&cwd),
        };
        Ok(Self { settings, data_dir })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(Settings::DATABASE_FILE)
    }

    /// Open the vault database, which must already have a master password.
    pub fn open_vault(&self) -> Result<Database> {
        let path = self.database_path();
        if !path.exists() {
            return Err(VaultPassError::NotInitialized);
        }
        let db = Database::open(&path)?;
        if !db.is_initialized()? {
            return Err(VaultPassError::NotInitialized);
        }
        Ok(db)
    }

    /// Log an operation to the audit database (if enabled).
    pub fn audit(&self, op: &str, target: Option<&str>, details: Option<&str>) {
        crate::audit::log_audit(&self.data_dir, self.settings.audit_log, op, target, details);
    }
}

/// Get an existing password from `env_var` or an interactive prompt.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| VaultPassError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Choose a new password, read from `env_var` or prompted with confirmation.
///
/// Enforces a minimum password length.
pub fn prompt_new_password(env_var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            check_password_len(&pw)?;
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(prompt)
                .with_confirmation("Confirm password", "Passwords do not match, try again")
                .interact()
                .map_err(|e| VaultPassError::CommandFailed(format!("password prompt: {e}")))?,
        );

        if check_password_len(&password).is_err() {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(password);
    }
}

fn check_password_len(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VaultPassError::CommandFailed(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
