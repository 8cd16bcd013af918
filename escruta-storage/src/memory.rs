//! In-memory report store

use crate::{ReportLogSnapshot, ReportStore};
use chrono::Utc;
use escruta_core::{
    EntityIdType, ReportId, ReporterId, StationId, StorageError, TableReport, Timestamp,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreInner {
    reports: HashMap<Uuid, TableReport>,
    /// Natural-key index enforcing one report per table.
    by_table: HashMap<(StationId, i32), ReportId>,
    /// Bumped on every successful mutation.
    version: u64,
}

/// Report store backed by process memory.
///
/// The uniqueness check and the insert happen under one write lock, so
/// racing writers for the same table serialize there and exactly one wins.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReportStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reports.
    pub fn report_count(&self) -> usize {
        self.inner.read().map(|inner| inner.reports.len()).unwrap_or(0)
    }

    fn read_inner(&self) -> Result<RwLockReadGuard<'_, StoreInner>, StorageError> {
        self.inner.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write_inner(&self) -> Result<RwLockWriteGuard<'_, StoreInner>, StorageError> {
        self.inner.write().map_err(|_| StorageError::LockPoisoned)
    }
}

impl ReportStore for InMemoryReportStore {
    fn report_insert(&self, report: &TableReport) -> Result<(), StorageError> {
        let mut inner = self.write_inner()?;
        let key = (report.station_id, report.table_number);
        if let Some(existing_id) = inner.by_table.get(&key) {
            return Err(StorageError::DuplicateReport {
                station_id: report.station_id.as_uuid(),
                table_number: report.table_number,
                existing_id: existing_id.as_uuid(),
            });
        }
        inner.by_table.insert(key, report.report_id);
        inner
            .reports
            .insert(report.report_id.as_uuid(), report.clone());
        inner.version += 1;
        Ok(())
    }

    fn report_get(&self, id: ReportId) -> Result<Option<TableReport>, StorageError> {
        let inner = self.read_inner()?;
        Ok(inner.reports.get(&id.as_uuid()).cloned())
    }

    fn report_get_by_table(
        &self,
        station_id: StationId,
        table_number: i32,
    ) -> Result<Option<TableReport>, StorageError> {
        let inner = self.read_inner()?;
        let report = inner
            .by_table
            .get(&(station_id, table_number))
            .and_then(|id| inner.reports.get(&id.as_uuid()))
            .cloned();
        Ok(report)
    }

    fn report_list_by_station(
        &self,
        station_id: StationId,
    ) -> Result<Vec<TableReport>, StorageError> {
        let inner = self.read_inner()?;
        let mut reports: Vec<TableReport> = inner
            .reports
            .values()
            .filter(|r| r.station_id == station_id)
            .cloned()
            .collect();
        reports.sort_by_key(|r| r.table_number);
        Ok(reports)
    }

    fn report_set_validated(
        &self,
        id: ReportId,
        value: bool,
        supervisor: ReporterId,
        at: Timestamp,
    ) -> Result<TableReport, StorageError> {
        let mut inner = self.write_inner()?;
        let report = inner
            .reports
            .get_mut(&id.as_uuid())
            .ok_or(StorageError::ReportNotFound { id: id.as_uuid() })?;
        report.set_validated(value, supervisor, at);
        let updated = report.clone();
        inner.version += 1;
        Ok(updated)
    }

    fn snapshot(&self) -> Result<ReportLogSnapshot, StorageError> {
        let inner = self.read_inner()?;
        let mut reports: Vec<TableReport> = inner.reports.values().cloned().collect();
        reports.sort_by_key(|r| (r.station_id, r.table_number));
        Ok(ReportLogSnapshot::new(inner.version, Utc::now(), reports))
    }
}
