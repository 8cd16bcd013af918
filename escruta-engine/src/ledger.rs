//! Supervisor validation ledger

use chrono::Utc;
use escruta_core::{CallerIdentity, EntityIdType, LedgerError, ReportId, StorageError, TableReport};
use escruta_storage::ReportStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Marks reported tables as supervisor-validated.
///
/// Validation is a reversible flag layered on top of the immutable report:
/// toggling it never touches vote counts, and only callers holding the
/// validate capability get through.
pub struct ValidationLedger {
    store: Arc<dyn ReportStore>,
}

impl ValidationLedger {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    pub fn set_validated(
        &self,
        caller: &CallerIdentity,
        report_id: ReportId,
        value: bool,
    ) -> Result<TableReport, LedgerError> {
        if !caller.capabilities.can_validate() {
            warn!(
                caller = %caller.reporter_id,
                report = %report_id,
                "validation attempt without supervisor capability"
            );
            return Err(LedgerError::CapabilityDenied {
                caller_id: caller.reporter_id.as_uuid(),
            });
        }

        match self
            .store
            .report_set_validated(report_id, value, caller.reporter_id, Utc::now())
        {
            Ok(updated) => {
                info!(
                    report = %report_id,
                    validated = value,
                    supervisor = %caller.reporter_id,
                    "validation mark updated"
                );
                Ok(updated)
            }
            // No stored report means the table was never submitted.
            Err(StorageError::ReportNotFound { id }) => {
                Err(LedgerError::NotReported { report_id: id })
            }
            Err(other) => Err(LedgerError::Storage(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escruta_core::{
        CapabilitySet, ReportSubmission, ReporterId, StationId, VoteTally,
    };
    use escruta_storage::InMemoryReportStore;

    fn seeded_ledger() -> (ValidationLedger, Arc<InMemoryReportStore>, TableReport) {
        let store = Arc::new(InMemoryReportStore::new());
        let submission =
            ReportSubmission::new(StationId::now_v7(), 1, VoteTally::new(250, 90, 8, 2));
        let report = TableReport::from_submission(&submission, ReporterId::now_v7(), Utc::now());
        store.report_insert(&report).unwrap();
        (ValidationLedger::new(store.clone()), store, report)
    }

    fn supervisor() -> CallerIdentity {
        CallerIdentity::new(ReporterId::now_v7(), "Jorge Salgado", CapabilitySet::supervisor())
    }

    fn witness() -> CallerIdentity {
        CallerIdentity::new(ReporterId::now_v7(), "Elena Vargas", CapabilitySet::witness())
    }

    #[test]
    fn supervisor_can_validate_and_revert() {
        let (ledger, store, report) = seeded_ledger();
        let caller = supervisor();

        let validated = ledger.set_validated(&caller, report.report_id, true).unwrap();
        assert!(validated.is_validated);
        assert_eq!(validated.validated_by, Some(caller.reporter_id));

        let reverted = ledger.set_validated(&caller, report.report_id, false).unwrap();
        assert!(!reverted.is_validated);
        assert_eq!(reverted.validated_at, None);

        let stored = store.report_get(report.report_id).unwrap().unwrap();
        assert_eq!(stored.tally, report.tally);
    }

    #[test]
    fn witness_is_refused() {
        let (ledger, _store, report) = seeded_ledger();
        let err = ledger
            .set_validated(&witness(), report.report_id, true)
            .unwrap_err();
        assert!(matches!(err, LedgerError::CapabilityDenied { .. }));
    }

    #[test]
    fn unreported_table_cannot_be_validated() {
        let (ledger, _store, _report) = seeded_ledger();
        let err = ledger
            .set_validated(&supervisor(), ReportId::now_v7(), true)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotReported { .. }));
    }

    #[test]
    fn validating_twice_is_harmless() {
        let (ledger, _store, report) = seeded_ledger();
        let caller = supervisor();
        ledger.set_validated(&caller, report.report_id, true).unwrap();
        let again = ledger.set_validated(&caller, report.report_id, true).unwrap();
        assert!(again.is_validated);
    }
}
