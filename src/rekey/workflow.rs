//! Changing the master password of a vault database.
//!
//! Wraps the engine with what the live application needs around it:
//! maintenance mode for the duration, the configured KDF and commit
//! settings, promoting the new master key hash and the failure policy.
//!
//! The engine stages the new hash as `master_pwd_hash_pending` before it
//! rewrites any record, so a crash never leaves records under a key
//! nothing describes. A change that stopped after committing records
//! keeps the vault in maintenance mode; running it again with the same
//! passwords picks up the pending key and finishes the job.

use tracing::{debug, info, warn};

use super::engine::{ReKeyEngine, ReKeyOutcome};
use super::events::EventSink;
use super::report::ReKeyReport;
use super::session::ReKeySession;
use super::transaction::SqliteBoundary;
use crate::config::{FailurePolicy, Settings};
use crate::errors::{EngineError, Result, VaultPassError};
use crate::store::Database;

/// Re-key every secret in `db` and switch it to the session's new password.
///
/// Returns the report of a completed run.  A cancelled or aborted run is
/// returned as an error. If it committed records, or was itself resuming
/// an earlier change, the vault stays in maintenance mode with the new
/// hash pending.
pub fn change_master_password(
    db: &Database,
    settings: &Settings,
    session: &ReKeySession,
    sink: &dyn EventSink,
) -> Result<ReKeyReport> {
    if !db.is_initialized()? {
        return Err(VaultPassError::NotInitialized);
    }
    let resuming = db.pending_master_hash()?.is_some();
    if resuming {
        warn!("an earlier master password change did not finish; resuming it");
    } else if db.in_maintenance()? {
        warn!("maintenance mode already on; a previous master password change did not finish");
    }

    db.set_maintenance(true)?;
    debug!("maintenance mode on");

    let outcome = match run_engine(db, settings, session, sink) {
        Ok(outcome) => outcome,
        Err(e) => {
            settle_interrupted(db, &e, resuming)?;
            return Err(e.into());
        }
    };

    db.promote_master_hash(&outcome.new_master_hash)?;
    db.set_maintenance(false)?;
    debug!("maintenance mode off");

    let report = outcome.report;
    info!(
        updated = report.total_updated(),
        failed = report.total_failed(),
        resumed = outcome.resumed,
        "master password changed"
    );

    match settings.rekey_failure_policy {
        FailurePolicy::Strict if report.has_failures() => Err(VaultPassError::PartialRekey {
            updated: report.total_updated(),
            failed: report.total_failed(),
        }),
        _ => Ok(report),
    }
}

fn run_engine(
    db: &Database,
    settings: &Settings,
    session: &ReKeySession,
    sink: &dyn EventSink,
) -> std::result::Result<ReKeyOutcome, EngineError> {
    let custom_fields = db.custom_field_data();
    let accounts = db.accounts();
    let history = db.account_history();
    let boundary = SqliteBoundary::new(db.connection());

    ReKeyEngine::new(db, sink)
        .register(&custom_fields)
        .register(&accounts)
        .register(&history)
        .with_boundary(&boundary)
        .with_params(settings.argon2_params())
        .with_granularity(settings.rekey_commit)
        .rekey(session)
}

/// Leave the vault after a run that did not complete.
///
/// Nothing committed and nothing to resume: the pending hash is dropped and
/// the vault unlocks with the current password again. Otherwise the vault
/// stays locked in maintenance mode until the change is re-run.
fn settle_interrupted(db: &Database, error: &EngineError, resuming: bool) -> Result<()> {
    let committed = error.report().map_or(0, ReKeyReport::total_updated);
    if resuming || committed > 0 {
        warn!(
            committed,
            "master password change interrupted; re-run it with the same passwords"
        );
        return Ok(());
    }

    db.clear_pending_master_hash()?;
    db.set_maintenance(false)?;
    debug!("maintenance mode off");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope::SealedSecret;
    use crate::crypto::kdf::{Argon2Params, MIN_MEMORY_KIB};
    use crate::crypto::master_hash::MasterKeyHash;
    use crate::rekey::events::MemorySink;
    use crate::store::{MasterKeyVerifier, SecretRecordStore};

    fn settings() -> Settings {
        Settings {
            argon2_memory_kib: MIN_MEMORY_KIB,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            ..Settings::default()
        }
    }

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn vault(password: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        let key = db.initialize(password.as_bytes(), &fast()).unwrap();
        db.accounts()
            .insert("mail", None, &SealedSecret::seal(b"hunter2", &key).unwrap())
            .unwrap();
        db
    }

    #[test]
    fn switches_master_password() {
        let db = vault("old1234");
        let before = db.last_master_update().unwrap();
        let report = change_master_password(
            &db,
            &settings(),
            &ReKeySession::new("old1234", "new5678"),
            &MemorySink::new(),
        )
        .unwrap();

        assert_eq!(report.total_updated(), 1);
        assert!(!db.in_maintenance().unwrap());
        assert!(matches!(
            db.unlock(b"old1234"),
            Err(VaultPassError::WrongMasterPassword)
        ));
        let key = db.unlock(b"new5678").unwrap();
        let account = db.accounts().find_by_name("mail").unwrap().unwrap();
        assert_eq!(account.secret.decrypt(&key).unwrap().as_slice(), b"hunter2");
        assert!(db.last_master_update().unwrap() >= before);
        assert!(db.pending_master_hash().unwrap().is_none());
        assert!(db
            .previous_master_hash()
            .unwrap()
            .unwrap()
            .unlock(b"old1234")
            .unwrap()
            .is_some());
    }

    #[test]
    fn wrong_password_leaves_vault_as_is() {
        let db = vault("old1234");
        let before = db.accounts().list_all_encrypted().unwrap();

        let err = change_master_password(
            &db,
            &settings(),
            &ReKeySession::new("nope", "new5678"),
            &MemorySink::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            VaultPassError::Engine(EngineError::WrongCurrentPassword)
        ));
        assert!(!db.in_maintenance().unwrap());
        assert!(db.pending_master_hash().unwrap().is_none());
        assert!(db.unlock(b"old1234").is_ok());
        assert_eq!(db.accounts().list_all_encrypted().unwrap(), before);
    }

    #[test]
    fn pending_change_needs_the_same_new_password() {
        let db = vault("old1234");
        let (pending, _) = MasterKeyHash::generate(b"new5678", &fast()).unwrap();
        db.stage_pending_hash(&pending.encode()).unwrap();
        db.set_maintenance(true).unwrap();

        let err = change_master_password(
            &db,
            &settings(),
            &ReKeySession::new("old1234", "other999"),
            &MemorySink::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VaultPassError::Engine(EngineError::PendingChange)
        ));
        assert!(db.in_maintenance().unwrap());
        assert_eq!(db.pending_master_hash().unwrap(), Some(pending.clone()));

        change_master_password(
            &db,
            &settings(),
            &ReKeySession::new("old1234", "new5678"),
            &MemorySink::new(),
        )
        .unwrap();
        assert_eq!(db.master_hash().unwrap(), pending);
        assert!(!db.in_maintenance().unwrap());
    }

    #[test]
    fn strict_policy_fails_on_partial_rekey() {
        let db = vault("old1234");
        db.connection()
            .execute("UPDATE accounts SET pass = x'00112233' WHERE name = 'mail'", [])
            .unwrap();

        let strict = Settings {
            rekey_failure_policy: FailurePolicy::Strict,
            ..settings()
        };
        let err = change_master_password(
            &db,
            &strict,
            &ReKeySession::new("old1234", "new5678"),
            &MemorySink::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VaultPassError::PartialRekey {
                updated: 0,
                failed: 1
            }
        ));
        // The run completed, so the new password is in effect.
        assert!(db.unlock(b"new5678").is_ok());
    }

    #[test]
    fn uninitialized_vault_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = change_master_password(
            &db,
            &settings(),
            &ReKeySession::new("a", "b"),
            &MemorySink::new(),
        )
        .unwrap_err();
        assert!(matches!(err, VaultPassError::NotInitialized));
    }
}
