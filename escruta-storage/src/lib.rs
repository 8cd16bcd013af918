//! ESCRUTA Storage - Report log trait and in-memory implementation
//!
//! The report log is the single system of record. The store enforces the
//! per-table uniqueness constraint and hands out consistent point-in-time
//! snapshots for aggregation, so a reader never observes a half-written log.

pub mod memory;

pub use memory::InMemoryReportStore;

use escruta_core::{ReportId, ReporterId, StationId, StorageError, TableReport, Timestamp};

// ============================================================================
// SNAPSHOT
// ============================================================================

/// A consistent point-in-time view of the report log.
///
/// All reads for one aggregation pass come from a single snapshot; the store
/// version ties the snapshot back to the mutation that produced it.
#[derive(Debug, Clone)]
pub struct ReportLogSnapshot {
    version: u64,
    taken_at: Timestamp,
    reports: Vec<TableReport>,
}

impl ReportLogSnapshot {
    pub fn new(version: u64, taken_at: Timestamp, reports: Vec<TableReport>) -> Self {
        Self {
            version,
            taken_at,
            reports,
        }
    }

    /// Monotonic store version at the time the snapshot was taken.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn taken_at(&self) -> Timestamp {
        self.taken_at
    }

    /// Reports ordered by (station, table number).
    pub fn reports(&self) -> &[TableReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn for_station(&self, station_id: StationId) -> impl Iterator<Item = &TableReport> {
        self.reports
            .iter()
            .filter(move |r| r.station_id == station_id)
    }

    pub fn for_table(&self, station_id: StationId, table_number: i32) -> Option<&TableReport> {
        self.reports
            .iter()
            .find(|r| r.station_id == station_id && r.table_number == table_number)
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Durable store for table reports.
///
/// Implementations must make `report_insert` atomic with respect to the
/// (station, table) uniqueness check: when two writers race on the same
/// table, exactly one insert succeeds and the other observes
/// `StorageError::DuplicateReport` carrying the winner's id.
pub trait ReportStore: Send + Sync {
    /// Insert a new report. Fails with `DuplicateReport` if the table
    /// already has one.
    fn report_insert(&self, report: &TableReport) -> Result<(), StorageError>;

    /// Get a report by its id.
    fn report_get(&self, id: ReportId) -> Result<Option<TableReport>, StorageError>;

    /// Get the report for one table, if any.
    fn report_get_by_table(
        &self,
        station_id: StationId,
        table_number: i32,
    ) -> Result<Option<TableReport>, StorageError>;

    /// All reports for one station, ordered by table number.
    fn report_list_by_station(
        &self,
        station_id: StationId,
    ) -> Result<Vec<TableReport>, StorageError>;

    /// Flip the validation mark on a stored report. Fails with
    /// `ReportNotFound` when the id is unknown. Returns the updated report.
    fn report_set_validated(
        &self,
        id: ReportId,
        value: bool,
        supervisor: ReporterId,
        at: Timestamp,
    ) -> Result<TableReport, StorageError>;

    /// Take a consistent snapshot of the whole log.
    fn snapshot(&self) -> Result<ReportLogSnapshot, StorageError>;
}
