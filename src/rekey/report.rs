//! Outcome of a re-key run, per secret kind.

use crate::store::record::{RecordId, SecretKind};

/// What happened to the records of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindReport {
    /// Records now encrypted under the new master key.
    pub updated: Vec<RecordId>,
    /// Records left untouched under the old key.
    pub failed: Vec<RecordId>,
    /// Records that were re-keyed and then rolled back by a cancellation
    /// or abort. They are still under the old key.
    pub reverted: Vec<RecordId>,
}

impl KindReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.failed.is_empty() && self.reverted.is_empty()
    }
}

/// Per-kind results, in the order the kinds were processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReKeyReport {
    kinds: Vec<(SecretKind, KindReport)>,
}

impl ReKeyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self, kind: SecretKind) -> Option<&KindReport> {
        self.kinds.iter().find(|(k, _)| *k == kind).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SecretKind, &KindReport)> {
        self.kinds.iter().map(|(k, r)| (*k, r))
    }

    pub fn total_updated(&self) -> usize {
        self.kinds.iter().map(|(_, r)| r.updated.len()).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.kinds.iter().map(|(_, r)| r.failed.len()).sum()
    }

    pub fn total_reverted(&self) -> usize {
        self.kinds.iter().map(|(_, r)| r.reverted.len()).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.total_failed() > 0
    }

    /// The entry for `kind`, created empty on first use.
    pub(crate) fn entry(&mut self, kind: SecretKind) -> &mut KindReport {
        let pos = match self.kinds.iter().position(|(k, _)| *k == kind) {
            Some(pos) => pos,
            None => {
                self.kinds.push((kind, KindReport::default()));
                self.kinds.len() - 1
            }
        };
        &mut self.kinds[pos].1
    }

    pub(crate) fn record_updated(&mut self, kind: SecretKind, id: RecordId) {
        self.entry(kind).updated.push(id);
    }

    pub(crate) fn record_failed(&mut self, kind: SecretKind, id: RecordId) {
        self.entry(kind).failed.push(id);
    }

    /// Move an updated id to `reverted` after its commit scope rolled back.
    pub(crate) fn revert(&mut self, kind: SecretKind, id: RecordId) {
        let entry = self.entry(kind);
        entry.updated.retain(|&u| u != id);
        entry.reverted.push(id);
    }
}

/// Comma-joined ids for event details and the audit log.
pub fn join_ids(ids: &[RecordId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_use_order() {
        let mut report = ReKeyReport::new();
        report.record_updated(SecretKind::Account, 1);
        report.entry(SecretKind::CustomFieldData);
        report.record_failed(SecretKind::Account, 2);

        let kinds: Vec<_> = report.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![SecretKind::Account, SecretKind::CustomFieldData]);
        assert_eq!(report.kind(SecretKind::Account).unwrap().failed, vec![2]);
        assert!(report.kind(SecretKind::CustomFieldData).unwrap().is_empty());
        assert!(report.kind(SecretKind::AccountHistory).is_none());
    }

    #[test]
    fn totals() {
        let mut report = ReKeyReport::new();
        report.record_updated(SecretKind::Account, 1);
        report.record_updated(SecretKind::Account, 3);
        report.record_updated(SecretKind::AccountHistory, 9);
        report.record_failed(SecretKind::Account, 2);

        assert_eq!(report.total_updated(), 3);
        assert_eq!(report.total_failed(), 1);
        assert!(report.has_failures());
    }

    #[test]
    fn revert_moves_id_out_of_updated() {
        let mut report = ReKeyReport::new();
        report.record_updated(SecretKind::Account, 1);
        report.record_updated(SecretKind::Account, 2);
        report.revert(SecretKind::Account, 2);

        let account = report.kind(SecretKind::Account).unwrap();
        assert_eq!(account.updated, vec![1]);
        assert_eq!(account.reverted, vec![2]);
        assert_eq!(report.total_reverted(), 1);
        assert!(!report.has_failures());
    }

    #[test]
    fn join_ids_formats_lists() {
        assert_eq!(join_ids(&[]), "");
        assert_eq!(join_ids(&[1, 3]), "1,3");
    }
}
