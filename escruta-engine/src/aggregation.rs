//! Aggregation engine
//!
//! Rollups are pure projections over one consistent snapshot of the report
//! log. Nothing here is ever the system of record; a crash costs only a
//! recomputation.

use chrono::Utc;
use escruta_core::{
    AggregateScope, AggregateSnapshot, EngineError, EntityIdType, TableDirectory, TableRef,
};
use escruta_storage::{ReportLogSnapshot, ReportStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Recomputes per-scope rollups from the report log.
pub struct AggregationEngine {
    store: Arc<dyn ReportStore>,
    directory: Arc<dyn TableDirectory>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn ReportStore>, directory: Arc<dyn TableDirectory>) -> Self {
        Self { store, directory }
    }

    /// Compute the reported and validated rollups for one scope.
    ///
    /// The whole computation reads from a single log snapshot, so a
    /// concurrent submission either fully shows up or not at all.
    pub fn aggregate(&self, scope: AggregateScope) -> Result<AggregateSnapshot, EngineError> {
        let tables = self.tables_for_scope(scope)?;
        let log = self.store.snapshot()?;
        debug!(
            ?scope,
            tables = tables.len(),
            log_version = log.version(),
            "recomputing aggregate"
        );
        Ok(roll_up(scope, &tables, &log))
    }

    /// Resolve a scope to its member tables, rejecting unknown ids.
    fn tables_for_scope(&self, scope: AggregateScope) -> Result<Vec<TableRef>, EngineError> {
        match scope {
            AggregateScope::Global => Ok(self.directory.all_tables()),
            AggregateScope::Municipality { municipality_id } => {
                self.directory.municipality(municipality_id).ok_or(
                    EngineError::UnknownMunicipality {
                        municipality_id: municipality_id.as_uuid(),
                    },
                )?;
                Ok(self
                    .directory
                    .stations_in(municipality_id)
                    .into_iter()
                    .flat_map(|s| self.directory.tables_at(s.station_id))
                    .collect())
            }
            AggregateScope::Station { station_id } => {
                self.directory
                    .station(station_id)
                    .ok_or(EngineError::UnknownStation {
                        station_id: station_id.as_uuid(),
                    })?;
                Ok(self.directory.tables_at(station_id))
            }
            AggregateScope::Table {
                station_id,
                table_number,
            } => {
                let table = self.directory.table(station_id, table_number).ok_or(
                    EngineError::UnknownTable {
                        station_id: station_id.as_uuid(),
                        table_number,
                    },
                )?;
                Ok(vec![table])
            }
        }
    }
}

/// Sum the log over the scope's member tables.
///
/// Summing member tables directly gives the same totals as nesting
/// station and municipality sums, since addition associates.
fn roll_up(
    scope: AggregateScope,
    tables: &[TableRef],
    log: &ReportLogSnapshot,
) -> AggregateSnapshot {
    let members: HashSet<(escruta_core::StationId, i32)> = tables
        .iter()
        .map(|t| (t.station_id, t.table_number))
        .collect();

    let mut snapshot = AggregateSnapshot::empty(scope, Utc::now());
    snapshot.log_version = log.version();
    snapshot.tables_total = tables.len() as i64;
    snapshot.expected_votes_total = tables.iter().map(|t| t.registered_voters as i64).sum();

    for report in log.reports() {
        if !members.contains(&(report.station_id, report.table_number)) {
            continue;
        }
        snapshot.tables_reported += 1;
        snapshot.votes_candidate_reported += report.tally.votes_candidate as i64;
        snapshot.votes_total_reported += report.tally.total_votes() as i64;
        snapshot.last_updated_at = Some(match snapshot.last_updated_at {
            Some(current) => current.max(report.reported_at),
            None => report.reported_at,
        });
        if report.is_validated {
            snapshot.tables_validated += 1;
            snapshot.votes_candidate_validated += report.tally.votes_candidate as i64;
            snapshot.votes_total_validated += report.tally.total_votes() as i64;
        }
    }
    snapshot
}
