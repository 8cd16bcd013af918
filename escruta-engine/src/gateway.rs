//! Report submission gateway

use chrono::Utc;
use escruta_core::{
    AssignmentRegistry, CallerIdentity, EntityIdType, GatewayError, ReportId, ReportSubmission,
    StorageError, TableReport,
};
use escruta_storage::ReportStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a successful submit produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A new report was persisted.
    Recorded(TableReport),
    /// The table already had this exact payload; the stored report is
    /// returned unchanged. Safe retry, not an error.
    AlreadyRecorded(TableReport),
}

impl SubmitOutcome {
    pub fn report(&self) -> &TableReport {
        match self {
            SubmitOutcome::Recorded(report) | SubmitOutcome::AlreadyRecorded(report) => report,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SubmitOutcome::Recorded(_))
    }
}

/// Entry point for all report submissions.
///
/// Checks assignment and tally invariants, then races the insert against
/// the store's per-table uniqueness constraint. Losers of that race observe
/// the stored report and either get it back (identical payload) or a hard
/// `AlreadyReported` conflict (divergent payload). Nothing is ever merged
/// or overwritten.
pub struct ReportGateway {
    store: Arc<dyn ReportStore>,
    registry: Arc<dyn AssignmentRegistry>,
}

impl ReportGateway {
    pub fn new(store: Arc<dyn ReportStore>, registry: Arc<dyn AssignmentRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn submit(
        &self,
        caller: &CallerIdentity,
        submission: &ReportSubmission,
    ) -> Result<SubmitOutcome, GatewayError> {
        submission.validate()?;

        if !self.registry.is_assigned(
            caller.reporter_id,
            submission.station_id,
            submission.table_number,
        ) {
            debug!(
                reporter = %caller.reporter_id,
                station = %submission.station_id,
                table = submission.table_number,
                "submission from unassigned reporter"
            );
            return Err(GatewayError::NotAssigned {
                reporter_id: caller.reporter_id.as_uuid(),
                station_id: submission.station_id.as_uuid(),
                table_number: submission.table_number,
            });
        }

        let report = TableReport::from_submission(submission, caller.reporter_id, Utc::now());
        match self.store.report_insert(&report) {
            Ok(()) => {
                info!(
                    report_id = %report.report_id,
                    station = %report.station_id,
                    table = report.table_number,
                    "table report recorded"
                );
                Ok(SubmitOutcome::Recorded(report))
            }
            Err(StorageError::DuplicateReport { existing_id, .. }) => {
                self.resolve_duplicate(ReportId::new(existing_id), submission)
            }
            Err(other) => Err(GatewayError::Storage(other)),
        }
    }

    /// The table already has a report; decide between safe retry and conflict.
    fn resolve_duplicate(
        &self,
        existing_id: ReportId,
        submission: &ReportSubmission,
    ) -> Result<SubmitOutcome, GatewayError> {
        let stored = self
            .store
            .report_get(existing_id)?
            .ok_or(StorageError::ReportNotFound {
                id: existing_id.as_uuid(),
            })?;

        if stored.matches_payload(submission) {
            debug!(
                report_id = %stored.report_id,
                "identical resubmission, returning stored report"
            );
            Ok(SubmitOutcome::AlreadyRecorded(stored))
        } else {
            warn!(
                report_id = %stored.report_id,
                station = %submission.station_id,
                table = submission.table_number,
                "divergent resubmission rejected"
            );
            Err(GatewayError::AlreadyReported {
                station_id: submission.station_id.as_uuid(),
                table_number: submission.table_number,
                existing_id: stored.report_id.as_uuid(),
            })
        }
    }
}
