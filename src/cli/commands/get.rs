//! `vaultpass get` — print a decrypted account password or field value.

use crate::cli::{prompt_password, Cli, Context, PASSWORD_ENV};
use crate::errors::{Result, VaultPassError};

/// Execute the `get` command.
pub fn execute(cli: &Cli, account: &str, field: Option<&str>) -> Result<()> {
    let ctx = Context::load(cli)?;
    let db = ctx.open_vault()?;
    let password = prompt_password(PASSWORD_ENV, "Enter master password")?;
    let master_key = db.unlock(password.as_bytes())?;

    let found = db
        .accounts()
        .find_by_name(account)?
        .ok_or_else(|| VaultPassError::AccountNotFound(account.to_string()))?;

    let record = match field {
        None => found.secret,
        Some(field) => {
            let (definition_id, _) = db
                .custom_field_definitions()
                .find_definition(field)?
                .ok_or_else(|| VaultPassError::FieldNotFound(field.to_string()))?;
            db.custom_field_data()
                .get_value(definition_id, found.id)?
                .ok_or_else(|| VaultPassError::FieldNotFound(field.to_string()))?
        }
    };

    let plaintext = record.decrypt(&master_key)?;
    println!("{}", String::from_utf8_lossy(&plaintext));

    Ok(())
}
