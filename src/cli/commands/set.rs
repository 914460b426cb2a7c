//! `vaultpass set` — store an account password or a custom field value.

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{prompt_password, Cli, Context, PASSWORD_ENV};
use crate::crypto::envelope::SealedSecret;
use crate::errors::{Result, VaultPassError};
use crate::store::{CustomFieldDefinition, Database, FieldType};

/// Execute the `set` command.
pub fn execute(
    cli: &Cli,
    account: &str,
    value: Option<&str>,
    login: Option<&str>,
    field: Option<&str>,
) -> Result<()> {
    let what = field.unwrap_or("password");

    // Determine the value from one of three sources.
    let secret_value = if let Some(v) = value {
        output::warning("Value provided on command line — it may appear in shell history.");
        Zeroizing::new(v.to_string())
    } else if !io::stdin().is_terminal() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Zeroizing::new(buf.trim_end().to_string())
    } else {
        Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("Enter {what} for {account}"))
                .interact()
                .map_err(|e| VaultPassError::CommandFailed(format!("input prompt: {e}")))?,
        )
    };

    let ctx = Context::load(cli)?;
    let db = ctx.open_vault()?;
    let password = prompt_password(PASSWORD_ENV, "Enter master password")?;
    let master_key = db.unlock(password.as_bytes())?;
    let sealed = SealedSecret::seal(secret_value.as_bytes(), &master_key)?;

    match field {
        Some(field) => {
            set_field(&db, account, field, &sealed)?;
            ctx.audit("set-field", Some(account), Some(field));
            output::success(&format!("Field '{field}' of '{account}' saved"));
        }
        None => {
            let replaced = set_password(&db, account, login, &sealed)?;
            let detail = if replaced { "updated" } else { "added" };
            ctx.audit("set", Some(account), Some(detail));
            if replaced {
                output::success(&format!(
                    "Password for '{account}' updated (previous one archived)"
                ));
            } else {
                output::success(&format!("Account '{account}' added"));
            }
        }
    }

    Ok(())
}

/// Insert or replace an account password. Returns whether it existed.
fn set_password(
    db: &Database,
    account: &str,
    login: Option<&str>,
    sealed: &SealedSecret,
) -> Result<bool> {
    let accounts = db.accounts();
    match accounts.find_by_name(account)? {
        Some(existing) => {
            accounts.replace_secret(existing.id, login, sealed)?;
            Ok(true)
        }
        None => {
            accounts.insert(account, login, sealed)?;
            Ok(false)
        }
    }
}

/// Store a custom field value, defining the field on first use.
fn set_field(db: &Database, account: &str, field: &str, sealed: &SealedSecret) -> Result<()> {
    let account = db
        .accounts()
        .find_by_name(account)?
        .ok_or_else(|| VaultPassError::AccountNotFound(account.to_string()))?;

    let definitions = db.custom_field_definitions();
    let definition_id = match definitions.find_definition(field)? {
        Some((id, _)) => id,
        None => {
            output::info(&format!("Defining new text field '{field}'"));
            definitions.define(&CustomFieldDefinition::new(field, FieldType::Text))?
        }
    };

    db.custom_field_data()
        .set_value(definition_id, account.id, sealed)?;
    Ok(())
}
