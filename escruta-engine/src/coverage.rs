//! Witness coverage analyzer

use chrono::Utc;
use escruta_core::{
    AssignmentRegistry, CoverageConfig, CoverageReport, EngineError, OverloadedReporter,
    ReporterId, StationCoverage, StationId, TableCoverage, TableDirectory,
};
use escruta_storage::{ReportLogSnapshot, ReportStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Cross-references the directory, the assignment registry, and the report
/// log into a ranked list of tables needing attention.
pub struct CoverageAnalyzer {
    store: Arc<dyn ReportStore>,
    directory: Arc<dyn TableDirectory>,
    registry: Arc<dyn AssignmentRegistry>,
    config: CoverageConfig,
}

impl CoverageAnalyzer {
    pub fn new(
        store: Arc<dyn ReportStore>,
        directory: Arc<dyn TableDirectory>,
        registry: Arc<dyn AssignmentRegistry>,
        config: CoverageConfig,
    ) -> Self {
        Self {
            store,
            directory,
            registry,
            config,
        }
    }

    /// Flat ranked list: biggest tables first, ties by ascending table
    /// number, station id as the final tiebreaker so the order is total.
    pub fn rank_tables(&self) -> Result<Vec<TableCoverage>, EngineError> {
        let log = self.store.snapshot()?;
        Ok(self.ranked_tables(&log))
    }

    /// The same ranking regrouped per station, stations ordered by their
    /// best-ranked table.
    pub fn coverage_by_station(&self) -> Result<Vec<StationCoverage>, EngineError> {
        let log = self.store.snapshot()?;
        Ok(group_by_station(&self.ranked_tables(&log)))
    }

    /// Informational only: never blocks an assignment or a submission.
    pub fn overloaded_reporters(&self) -> Vec<OverloadedReporter> {
        flag_overloaded(
            &self.registry.all_assignments(),
            self.config.max_tables_per_witness,
        )
    }

    /// Everything at once from one log snapshot, for the coverage endpoint.
    pub fn analyze(&self) -> Result<CoverageReport, EngineError> {
        let log = self.store.snapshot()?;
        let tables = self.ranked_tables(&log);
        let critical_gap_count = tables.iter().filter(|t| t.critical_gap).count();
        let stations = group_by_station(&tables);
        let overloaded_reporters = self.overloaded_reporters();

        debug!(
            tables = tables.len(),
            critical_gaps = critical_gap_count,
            overloaded = overloaded_reporters.len(),
            "coverage recomputed"
        );

        Ok(CoverageReport {
            generated_at: Utc::now(),
            tables,
            stations,
            overloaded_reporters,
            critical_gap_count,
        })
    }

    fn ranked_tables(&self, log: &ReportLogSnapshot) -> Vec<TableCoverage> {
        let reported: HashSet<(StationId, i32)> = log
            .reports()
            .iter()
            .map(|r| (r.station_id, r.table_number))
            .collect();

        let station_names: HashMap<StationId, String> = self
            .directory
            .municipalities()
            .into_iter()
            .flat_map(|m| self.directory.stations_in(m.municipality_id))
            .map(|s| (s.station_id, s.name))
            .collect();

        let assignments = self.registry.all_assignments();

        let mut tables: Vec<TableCoverage> = Vec::new();
        for table in self.directory.all_tables() {
            let witnesses: Vec<&escruta_core::WitnessAssignment> = assignments
                .iter()
                .filter(|a| a.covers(table.station_id, table.table_number))
                .collect();
            let witness_count = witnesses.len() as i32;
            let station_name = station_names
                .get(&table.station_id)
                .cloned()
                .unwrap_or_default();

            tables.push(TableCoverage {
                station_id: table.station_id,
                station_name,
                table_number: table.table_number,
                registered_voters: table.registered_voters,
                priority: 0,
                has_witness: witness_count > 0,
                witness_count,
                witness_names: witnesses.iter().map(|a| a.reporter_name.clone()).collect(),
                has_report: reported.contains(&(table.station_id, table.table_number)),
                critical_gap: witness_count == 0
                    && table.registered_voters >= self.config.critical_voter_threshold,
            });
        }

        tables.sort_by(|a, b| {
            b.registered_voters
                .cmp(&a.registered_voters)
                .then(a.table_number.cmp(&b.table_number))
                .then(a.station_id.cmp(&b.station_id))
        });
        for (index, table) in tables.iter_mut().enumerate() {
            table.priority = index as i32 + 1;
        }
        tables
    }
}

/// Regroup the ranked list per station, keeping rank order inside each
/// group and ordering groups by their best-ranked table.
fn group_by_station(ranked: &[TableCoverage]) -> Vec<StationCoverage> {
    let mut order: Vec<StationId> = Vec::new();
    let mut groups: HashMap<StationId, Vec<TableCoverage>> = HashMap::new();
    for table in ranked {
        if !groups.contains_key(&table.station_id) {
            order.push(table.station_id);
        }
        groups
            .entry(table.station_id)
            .or_default()
            .push(table.clone());
    }
    order
        .into_iter()
        .map(|station_id| {
            let tables = groups.remove(&station_id).unwrap_or_default();
            let station_name = tables
                .first()
                .map(|t| t.station_name.clone())
                .unwrap_or_default();
            StationCoverage {
                station_id,
                station_name,
                tables,
            }
        })
        .collect()
}

fn flag_overloaded(
    assignments: &[escruta_core::WitnessAssignment],
    max_tables: usize,
) -> Vec<OverloadedReporter> {
    let mut per_reporter: HashMap<ReporterId, (String, usize)> = HashMap::new();
    for assignment in assignments {
        let entry = per_reporter
            .entry(assignment.reporter_id)
            .or_insert_with(|| (assignment.reporter_name.clone(), 0));
        entry.1 += assignment.table_count();
    }

    let mut overloaded: Vec<OverloadedReporter> = per_reporter
        .into_iter()
        .filter(|(_, (_, count))| *count > max_tables)
        .map(|(reporter_id, (reporter_name, count))| OverloadedReporter {
            reporter_id,
            reporter_name,
            assigned_tables: count as i32,
        })
        .collect();
    overloaded.sort_by(|a, b| {
        b.assigned_tables
            .cmp(&a.assigned_tables)
            .then(a.reporter_id.cmp(&b.reporter_id))
    });
    overloaded
}
