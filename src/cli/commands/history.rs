//! `vaultpass history` — list the archived passwords of an account.

use crate::cli::output;
use crate::cli::{Cli, Context};
use crate::errors::{Result, VaultPassError};

/// Execute the `history` command.
pub fn execute(cli: &Cli, account: &str) -> Result<()> {
    let ctx = Context::load(cli)?;
    let db = ctx.open_vault()?;

    let found = db
        .accounts()
        .find_by_name(account)?
        .ok_or_else(|| VaultPassError::AccountNotFound(account.to_string()))?;

    let entries = db.account_history().list_for_account(found.id)?;
    output::print_history_table(account, &entries);

    Ok(())
}
