//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::rekey::events::{EventMessage, EventName, EventSink};
use crate::rekey::report::ReKeyReport;
use crate::store::{HistoryEntry, RecordFormat};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Re-key progress on the terminal.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn notify(&self, name: EventName, message: &EventMessage) {
        match name {
            EventName::Start | EventName::KindStart => info(&message.description),
            EventName::KindEmpty => tip(&message.description),
            EventName::KindEnd => {
                if message.detail("failed").is_some_and(|f| f != "0") {
                    warning(&message.description);
                } else {
                    success(&message.description);
                }
            }
            EventName::RecordFailed => {
                let reason = message.detail("error").unwrap_or("unknown error");
                warning(&format!("{}: {reason}", message.description));
            }
            EventName::Aborted | EventName::Cancelled => error(&message.description),
            EventName::RecordUpdated | EventName::End => {}
        }
    }
}

/// Print the per-kind outcome of a re-key run.
pub fn print_rekey_report(report: &ReKeyReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Kind", "Updated", "Failed", "Reverted", "Failed ids"]);

    for (kind, entry) in report.iter() {
        let failed_ids = if entry.failed.is_empty() {
            "-".to_string()
        } else {
            crate::rekey::report::join_ids(&entry.failed)
        };
        table.add_row(vec![
            kind.title().to_string(),
            entry.updated.len().to_string(),
            entry.failed.len().to_string(),
            entry.reverted.len().to_string(),
            failed_ids,
        ]);
    }

    println!("{table}");
}

/// Print the archived versions of an account.
pub fn print_history_table(account: &str, entries: &[HistoryEntry]) {
    if entries.is_empty() {
        info(&format!("No archived passwords for '{account}'."));
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Id", "Archived", "Login", "Format"]);

    for entry in entries {
        let format = match entry.secret.format() {
            Ok(RecordFormat::Envelope) => "envelope",
            Ok(RecordFormat::Legacy) => "legacy",
            Err(_) => "invalid",
        };
        table.add_row(vec![
            entry.id.to_string(),
            entry.archived_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.login.clone().unwrap_or_else(|| "-".to_string()),
            format.to_string(),
        ]);
    }

    println!(
        "{}",
        style(format!("{} archived password(s) for '{account}':", entries.len())).bold()
    );
    println!("{table}");
}
