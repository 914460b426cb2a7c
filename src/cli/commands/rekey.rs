//! `vaultpass rekey` — change the master password.
//!
//! Every account password, archived password and custom field value is
//! re-sealed under a fresh data key wrapped by the new master key, while
//! the vault is in maintenance mode.

use crate::audit::AuditLog;
use crate::cli::output::{self, ConsoleSink};
use crate::cli::{prompt_new_password, prompt_password, Cli, Context, NEW_PASSWORD_ENV, PASSWORD_ENV};
use crate::errors::{Result, VaultPassError};
use crate::rekey::{change_master_password, Fanout, ReKeyReport, ReKeySession};

/// Execute the `rekey` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let ctx = Context::load(cli)?;
    let db = ctx.open_vault()?;

    let current = prompt_password(PASSWORD_ENV, "Enter current master password")?;
    let new = prompt_new_password(NEW_PASSWORD_ENV, "Choose new master password")?;
    if *current == *new {
        return Err(VaultPassError::CommandFailed(
            "the new master password must differ from the current one".into(),
        ));
    }
    let session = ReKeySession::new(current.as_str(), new.as_str());

    let audit = if ctx.settings.audit_log {
        AuditLog::open(&ctx.data_dir)
    } else {
        None
    };
    let console = ConsoleSink;
    let mut sink = Fanout::new().with(&console);
    if let Some(audit) = &audit {
        sink = sink.with(audit);
    }

    match change_master_password(&db, &ctx.settings, &session, &sink) {
        Ok(report) => {
            output::print_rekey_report(&report);
            summarize(&report);
            Ok(())
        }
        Err(VaultPassError::Engine(e)) => {
            if let Some(report) = e.report() {
                output::print_rekey_report(report);
                if report.total_updated() > 0 {
                    output::warning(
                        "Some records were committed under the new master password before the run stopped.",
                    );
                }
            }
            if db.in_maintenance()? {
                output::tip("Re-run `vaultpass rekey` with the same passwords to finish the change.");
            }
            Err(e.into())
        }
        Err(e) => Err(e),
    }
}

fn summarize(report: &ReKeyReport) {
    if report.has_failures() {
        output::warning(&format!(
            "{} records updated, {} failed — check the log",
            report.total_updated(),
            report.total_failed()
        ));
        output::tip("Failed records are still encrypted under the previous master password.");
        output::tip("Run `vaultpass audit --since 1h` for details.");
    } else {
        output::success(&format!(
            "Master password changed ({} records re-keyed)",
            report.total_updated()
        ));
    }
}
