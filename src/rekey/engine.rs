//! The re-key orchestrator.
//!
//! Verifies the current master password, derives the new master key and
//! then walks every registered store, re-sealing each record under a fresh
//! data key wrapped by the new master key.  Legacy records come out in
//! envelope format.
//!
//! The new key's hash is staged with the verifier before the first record
//! is rewritten. A later run with the same new password finds it, reuses
//! the key and re-keys whatever the interrupted run left behind.
//!
//! Per-record failures are caught and reported; only verification and
//! structural failures (a store that cannot be listed, a commit scope that
//! cannot be opened or committed) end the run.

use tracing::{debug, warn};

use super::events::{EventMessage, EventName, EventSink};
use super::report::{join_ids, ReKeyReport};
use super::session::{EngineState, ReKeySession, TaskHandle};
use super::transaction::{CommitGranularity, NoTransaction, Scope, TransactionBoundary};
use crate::crypto::envelope::SealedSecret;
use crate::crypto::kdf::Argon2Params;
use crate::crypto::keys::MasterKey;
use crate::crypto::master_hash::MasterKeyHash;
use crate::errors::{CryptoError, EngineError, RecordError, StorageError};
use crate::store::record::{RecordId, SecretKind, SecretRecord};
use crate::store::{MasterKeyVerifier, SecretRecordStore};

/// A completed run.
#[derive(Debug)]
pub struct ReKeyOutcome {
    pub report: ReKeyReport,
    /// Hash of the new master key, also staged as the verifier's pending
    /// hash. The caller makes it the active one.
    pub new_master_hash: MasterKeyHash,
    /// The run picked up the pending key of an unfinished change.
    pub resumed: bool,
}

pub struct ReKeyEngine<'a> {
    verifier: &'a dyn MasterKeyVerifier,
    stores: Vec<&'a dyn SecretRecordStore>,
    boundary: &'a dyn TransactionBoundary,
    sink: &'a dyn EventSink,
    params: Argon2Params,
    granularity: CommitGranularity,
}

/// Mutable state of one pass, kept out of the engine itself.
#[derive(Default)]
struct Pass {
    report: ReKeyReport,
    open: Option<Scope>,
    /// Records updated inside the open scope.
    pending: Vec<(SecretKind, RecordId)>,
    /// Records may already be sealed under the new key.
    resumed: bool,
}

impl<'a> ReKeyEngine<'a> {
    pub fn new(verifier: &'a dyn MasterKeyVerifier, sink: &'a dyn EventSink) -> Self {
        Self {
            verifier,
            stores: Vec::new(),
            boundary: &NoTransaction,
            sink,
            params: Argon2Params::default(),
            granularity: CommitGranularity::default(),
        }
    }

    /// Add a store. Stores are processed in registration order.
    pub fn register(mut self, store: &'a dyn SecretRecordStore) -> Self {
        self.stores.push(store);
        self
    }

    pub fn with_boundary(mut self, boundary: &'a dyn TransactionBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// KDF parameters for the new master key.
    pub fn with_params(mut self, params: Argon2Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_granularity(mut self, granularity: CommitGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Re-key every registered store from the session's current password
    /// to its new one.
    pub fn rekey(&self, session: &ReKeySession) -> Result<ReKeyOutcome, EngineError> {
        let handle = session.handle();

        mark(handle, EngineState::Verifying);
        debug!("verifying current master password");
        let old_key = match self.verify_current(session.current_password()) {
            Ok(key) => key,
            Err(e) => return Err(self.fail(handle, e)),
        };

        let (new_hash, new_key, resumed) = match self.new_master_key(session.new_password()) {
            Ok(found) => found,
            Err(e) => return Err(self.fail(handle, e)),
        };
        if resumed {
            debug!("resuming an unfinished master password change");
        }

        let mut pass = Pass {
            resumed,
            ..Pass::default()
        };
        for store in &self.stores {
            pass.report.entry(store.kind());
        }

        // Everything is listed before anything is written.
        let mut listings = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            match store.list_all_encrypted() {
                Ok(records) => listings.push(records),
                Err(e) => {
                    let reason = format!("cannot list {} records: {e}", store.kind());
                    return Err(self.abort(handle, pass, reason, new_hash));
                }
            }
        }

        if !resumed {
            if let Err(e) = self.verifier.stage_pending_hash(&new_hash.encode()) {
                let reason = format!("cannot record new master key hash: {e}");
                return Err(self.abort(handle, pass, reason, new_hash));
            }
        }

        let total: usize = listings.iter().map(Vec::len).sum();
        if let Some(h) = handle {
            h.set_total(total);
        }
        self.emit(
            EventName::Start,
            EventMessage::new(format!("re-keying {total} record(s)"))
                .with("kinds", self.stores.len())
                .with("records", total)
                .with("resumed", resumed),
        );

        let scope = self.granularity.scope();
        if scope == Scope::Run {
            if let Err(e) = self.open(&mut pass, Scope::Run) {
                return Err(self.abort(handle, pass, boundary_reason("begin", &e), new_hash));
            }
        }

        for (store, records) in self.stores.iter().zip(listings) {
            if is_cancelled(handle) {
                return Err(self.cancel(handle, pass, new_hash));
            }

            let kind = store.kind();
            mark(handle, EngineState::Processing(kind));
            if records.is_empty() {
                debug!(%kind, "no records");
                self.emit(
                    EventName::KindEmpty,
                    EventMessage::new(format!("no data for {}", kind.title())).with("kind", kind),
                );
                continue;
            }

            debug!(%kind, count = records.len(), "processing kind");
            self.emit(
                EventName::KindStart,
                EventMessage::new(format!("re-keying {} {}", records.len(), kind.title()))
                    .with("kind", kind)
                    .with("records", records.len()),
            );

            if scope == Scope::Kind {
                if let Err(e) = self.open(&mut pass, Scope::Kind) {
                    return Err(self.abort(handle, pass, boundary_reason("begin", &e), new_hash));
                }
            }

            for listed in records {
                if is_cancelled(handle) {
                    return Err(self.cancel(handle, pass, new_hash));
                }

                let record = match listed {
                    Ok(record) => record,
                    Err(unreadable) => {
                        let label = format!("record {}", unreadable.id);
                        let id = unreadable.id;
                        let error = RecordError::from(unreadable);
                        self.record_failed(kind, id, &label, &error, &mut pass);
                        advance(handle);
                        continue;
                    }
                };

                if scope == Scope::Record {
                    if let Err(e) = self.open(&mut pass, Scope::Record) {
                        return Err(self.abort(
                            handle,
                            pass,
                            boundary_reason("begin", &e),
                            new_hash,
                        ));
                    }
                }

                self.process(*store, &record, &old_key, &new_key, &mut pass);

                if scope == Scope::Record {
                    if let Err(e) = self.commit(&mut pass) {
                        return Err(self.abort(
                            handle,
                            pass,
                            boundary_reason("commit", &e),
                            new_hash,
                        ));
                    }
                }
                advance(handle);
            }

            if scope == Scope::Kind {
                if let Err(e) = self.commit(&mut pass) {
                    return Err(self.abort(handle, pass, boundary_reason("commit", &e), new_hash));
                }
            }

            let kind_report = pass.report.entry(kind);
            let message = EventMessage::new(format!(
                "{}: {} updated, {} failed",
                kind.title(),
                kind_report.updated.len(),
                kind_report.failed.len()
            ))
            .with("kind", kind)
            .with("updated", kind_report.updated.len())
            .with("failed", kind_report.failed.len())
            .with("updated_ids", join_ids(&kind_report.updated))
            .with("failed_ids", join_ids(&kind_report.failed));
            self.emit(EventName::KindEnd, message);
        }

        if scope == Scope::Run {
            if let Err(e) = self.commit(&mut pass) {
                return Err(self.abort(handle, pass, boundary_reason("commit", &e), new_hash));
            }
        }

        mark(handle, EngineState::Aggregating);
        let report = pass.report;
        self.emit(
            EventName::End,
            EventMessage::new(format!(
                "{} record(s) updated, {} failed",
                report.total_updated(),
                report.total_failed()
            ))
            .with("updated", report.total_updated())
            .with("failed", report.total_failed()),
        );
        mark(handle, EngineState::Done);
        debug!("re-key complete");

        Ok(ReKeyOutcome {
            report,
            new_master_hash: new_hash,
            resumed,
        })
    }

    fn verify_current(&self, password: &[u8]) -> Result<MasterKey, EngineError> {
        let stored = self.verifier.stored_hash().map_err(|e| EngineError::Aborted {
            reason: format!("cannot read master key hash: {e}"),
            report: ReKeyReport::new(),
            new_master_hash: None,
        })?;
        let hash = match MasterKeyHash::decode(&stored) {
            Ok(hash) => hash,
            Err(CryptoError::MalformedHash) => return Err(EngineError::WrongCurrentPassword),
            Err(e) => return Err(e.into()),
        };
        hash.unlock(password)?
            .ok_or(EngineError::WrongCurrentPassword)
    }

    /// The key records move to, and whether it was already staged by an
    /// unfinished change. A staged key is only reused for the same password.
    fn new_master_key(
        &self,
        password: &[u8],
    ) -> Result<(MasterKeyHash, MasterKey, bool), EngineError> {
        let pending = self
            .verifier
            .pending_hash()
            .map_err(|e| EngineError::Aborted {
                reason: format!("cannot read pending master key hash: {e}"),
                report: ReKeyReport::new(),
                new_master_hash: None,
            })?;

        match pending {
            Some(encoded) => {
                let hash = MasterKeyHash::decode(&encoded)?;
                let key = hash.unlock(password)?.ok_or(EngineError::PendingChange)?;
                Ok((hash, key, true))
            }
            None => {
                let (hash, key) = MasterKeyHash::generate(password, &self.params)?;
                Ok((hash, key, false))
            }
        }
    }

    /// Re-key one record, recording the result either way.
    fn process(
        &self,
        store: &dyn SecretRecordStore,
        record: &SecretRecord,
        old_key: &MasterKey,
        new_key: &MasterKey,
        pass: &mut Pass,
    ) {
        let kind = record.kind;
        match reseal(store, record, old_key, new_key, pass.resumed) {
            Ok(()) => {
                pass.report.record_updated(kind, record.id);
                pass.pending.push((kind, record.id));
                self.emit(
                    EventName::RecordUpdated,
                    EventMessage::new(format!("re-keyed {}", record.label))
                        .with("kind", kind)
                        .with("id", record.id),
                );
            }
            Err(e) => self.record_failed(kind, record.id, &record.label, &e, pass),
        }
    }

    fn record_failed(
        &self,
        kind: SecretKind,
        id: RecordId,
        label: &str,
        error: &RecordError,
        pass: &mut Pass,
    ) {
        warn!(%kind, id, error = %error, "record not re-keyed");
        pass.report.record_failed(kind, id);
        self.emit(
            EventName::RecordFailed,
            EventMessage::new(format!("could not re-key {label}"))
                .with("kind", kind)
                .with("id", id)
                .with("error", error),
        );
    }

    fn open(&self, pass: &mut Pass, scope: Scope) -> Result<(), StorageError> {
        self.boundary.begin(scope)?;
        pass.open = Some(scope);
        Ok(())
    }

    fn commit(&self, pass: &mut Pass) -> Result<(), StorageError> {
        if let Some(scope) = pass.open {
            self.boundary.commit(scope)?;
            pass.open = None;
            pass.pending.clear();
        }
        Ok(())
    }

    /// Roll back the open scope and mark its records reverted.
    fn roll_back(&self, pass: &mut Pass) {
        if let Some(scope) = pass.open.take() {
            if let Err(e) = self.boundary.rollback(scope) {
                warn!(?scope, error = %e, "rollback failed");
            }
            for (kind, id) in std::mem::take(&mut pass.pending) {
                pass.report.revert(kind, id);
            }
        }
    }

    fn abort(
        &self,
        handle: Option<&TaskHandle>,
        mut pass: Pass,
        reason: String,
        new_hash: MasterKeyHash,
    ) -> EngineError {
        self.roll_back(&mut pass);
        self.fail(
            handle,
            EngineError::Aborted {
                reason,
                report: pass.report,
                new_master_hash: Some(new_hash),
            },
        )
    }

    fn cancel(
        &self,
        handle: Option<&TaskHandle>,
        mut pass: Pass,
        new_hash: MasterKeyHash,
    ) -> EngineError {
        self.roll_back(&mut pass);
        let (processed, total) = handle.map_or((0, 0), TaskHandle::progress);
        debug!(processed, total, "re-key cancelled");
        self.emit(
            EventName::Cancelled,
            EventMessage::new("re-key cancelled")
                .with("processed", processed)
                .with("total", total)
                .with("updated", pass.report.total_updated())
                .with("reverted", pass.report.total_reverted()),
        );
        mark(handle, EngineState::Aborted);
        EngineError::Cancelled {
            report: pass.report,
            new_master_hash: new_hash,
        }
    }

    /// Emit `rekey.aborted` for a fatal error and hand it back.
    fn fail(&self, handle: Option<&TaskHandle>, error: EngineError) -> EngineError {
        debug!(error = %error, "re-key aborted");
        self.emit(EventName::Aborted, EventMessage::new(error.to_string()));
        mark(handle, EngineState::Aborted);
        error
    }

    fn emit(&self, name: EventName, message: EventMessage) {
        self.sink.notify(name, &message);
    }
}

fn reseal(
    store: &dyn SecretRecordStore,
    record: &SecretRecord,
    old_key: &MasterKey,
    new_key: &MasterKey,
    resumed: bool,
) -> Result<(), RecordError> {
    let plaintext = match record.decrypt(old_key) {
        Ok(plaintext) => plaintext,
        // Already moved by the interrupted run.
        Err(RecordError::Crypto(CryptoError::AuthenticationFailed)) if resumed => {
            record.decrypt(new_key)?
        }
        Err(e) => return Err(e),
    };
    let sealed = SealedSecret::seal(&plaintext, new_key)?;
    store.update(&record.resealed(sealed))?;
    Ok(())
}

fn mark(handle: Option<&TaskHandle>, state: EngineState) {
    if let Some(h) = handle {
        h.set_state(state);
    }
}

fn advance(handle: Option<&TaskHandle>) {
    if let Some(h) = handle {
        h.advance();
    }
}

fn is_cancelled(handle: Option<&TaskHandle>) -> bool {
    handle.is_some_and(TaskHandle::is_cancelled)
}

fn boundary_reason(step: &str, e: &StorageError) -> String {
    format!("cannot {step} commit scope: {e}")
}
