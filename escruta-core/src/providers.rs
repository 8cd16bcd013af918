//! Collaborator interfaces consumed by the engine
//!
//! The directory, the assignment registry, and the identity module are owned
//! elsewhere; the engine only reads from them through these traits.

use crate::{
    CallerIdentity, MunicipalityId, MunicipalityRef, ReporterId, StationId, StationRef, TableRef,
    WitnessAssignment,
};

/// Read-only view of the electoral directory: municipalities, stations,
/// tables, and registered-voter counts.
pub trait TableDirectory: Send + Sync {
    fn municipalities(&self) -> Vec<MunicipalityRef>;

    fn municipality(&self, municipality_id: MunicipalityId) -> Option<MunicipalityRef>;

    fn stations_in(&self, municipality_id: MunicipalityId) -> Vec<StationRef>;

    fn station(&self, station_id: StationId) -> Option<StationRef>;

    fn tables_at(&self, station_id: StationId) -> Vec<TableRef>;

    fn table(&self, station_id: StationId, table_number: i32) -> Option<TableRef>;

    /// Every table in the directory, across all stations.
    fn all_tables(&self) -> Vec<TableRef> {
        self.municipalities()
            .into_iter()
            .flat_map(|m| self.stations_in(m.municipality_id))
            .flat_map(|s| self.tables_at(s.station_id))
            .collect()
    }
}

/// Read-only view of witness assignments.
pub trait AssignmentRegistry: Send + Sync {
    fn assignments_for_reporter(&self, reporter_id: ReporterId) -> Vec<WitnessAssignment>;

    fn assignments_for_station(&self, station_id: StationId) -> Vec<WitnessAssignment>;

    fn all_assignments(&self) -> Vec<WitnessAssignment>;

    /// Does any of the reporter's assignments cover the table?
    fn is_assigned(&self, reporter_id: ReporterId, station_id: StationId, table_number: i32) -> bool {
        self.assignments_for_reporter(reporter_id)
            .iter()
            .any(|a| a.covers(station_id, table_number))
    }
}

/// Token authentication backed by the identity module.
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to a caller, or `None` if the token is unknown.
    fn authenticate(&self, token: &str) -> Option<CallerIdentity>;

    /// Look up a known reporter by id.
    fn reporter(&self, reporter_id: ReporterId) -> Option<CallerIdentity>;
}
