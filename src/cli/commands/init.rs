//! `vaultpass init` — create the vault database and set the master password.

use std::fs;

use crate::cli::output;
use crate::cli::{prompt_new_password, Cli, Context, PASSWORD_ENV};
use crate::errors::{Result, VaultPassError};
use crate::store::Database;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let db_path = ctx.database_path();

    // 1. Create the data directory if it doesn't exist.
    if !ctx.data_dir.exists() {
        fs::create_dir_all(&ctx.data_dir)?;
        output::info(&format!("Created data directory: {}", ctx.data_dir.display()));
    }

    // 2. Refuse to overwrite an existing master password.
    let db = Database::open(&db_path)?;
    if db.is_initialized()? {
        output::tip("Use `vaultpass rekey` to change the master password.");
        return Err(VaultPassError::AlreadyInitialized(db_path));
    }

    // 3. Choose the master password and store its hash.
    let password = prompt_new_password(PASSWORD_ENV, "Choose master password")?;
    db.initialize(password.as_bytes(), &ctx.settings.argon2_params())?;

    ctx.audit("init", None, Some("vault created"));

    output::success(&format!("Vault created at {}", db_path.display()));
    output::tip("Run `vaultpass set <ACCOUNT>` to store a password.");

    Ok(())
}
