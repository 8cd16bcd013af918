//! Static provider implementations
//!
//! The directory, the assignment registry, and the identity set for an
//! election are prepared ahead of time and do not change on election day,
//! so file-backed static implementations cover the server deployment.

use escruta_core::{
    AssignmentRegistry, CallerIdentity, IdentityProvider, MunicipalityId, MunicipalityRef,
    ReporterId, StationId, StationRef, TableDirectory, TableRef, WitnessAssignment,
};
use escruta_core::EntityIdType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ProviderFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ============================================================================
// DIRECTORY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirectoryFile {
    municipalities: Vec<MunicipalityRef>,
    stations: Vec<StationRef>,
    tables: Vec<TableRef>,
}

/// Electoral directory held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    municipalities: Vec<MunicipalityRef>,
    stations: Vec<StationRef>,
    tables: Vec<TableRef>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ProviderFileError> {
        let contents = std::fs::read_to_string(path)?;
        let file: DirectoryFile = serde_json::from_str(&contents)?;
        Ok(Self {
            municipalities: file.municipalities,
            stations: file.stations,
            tables: file.tables,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProviderFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = DirectoryFile {
            municipalities: self.municipalities.clone(),
            stations: self.stations.clone(),
            tables: self.tables.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn add_municipality(&mut self, name: &str) -> MunicipalityId {
        let municipality_id = MunicipalityId::now_v7();
        self.municipalities.push(MunicipalityRef {
            municipality_id,
            name: name.to_string(),
        });
        municipality_id
    }

    pub fn add_station(&mut self, municipality_id: MunicipalityId, name: &str) -> StationId {
        let station_id = StationId::now_v7();
        self.stations.push(StationRef {
            station_id,
            name: name.to_string(),
            municipality_id,
        });
        station_id
    }

    pub fn add_table(&mut self, station_id: StationId, table_number: i32, registered_voters: i32) {
        self.tables.push(TableRef {
            station_id,
            table_number,
            registered_voters,
        });
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl TableDirectory for StaticDirectory {
    fn municipalities(&self) -> Vec<MunicipalityRef> {
        self.municipalities.clone()
    }

    fn municipality(&self, municipality_id: MunicipalityId) -> Option<MunicipalityRef> {
        self.municipalities
            .iter()
            .find(|m| m.municipality_id == municipality_id)
            .cloned()
    }

    fn stations_in(&self, municipality_id: MunicipalityId) -> Vec<StationRef> {
        self.stations
            .iter()
            .filter(|s| s.municipality_id == municipality_id)
            .cloned()
            .collect()
    }

    fn station(&self, station_id: StationId) -> Option<StationRef> {
        self.stations
            .iter()
            .find(|s| s.station_id == station_id)
            .cloned()
    }

    fn tables_at(&self, station_id: StationId) -> Vec<TableRef> {
        self.tables
            .iter()
            .filter(|t| t.station_id == station_id)
            .copied()
            .collect()
    }

    fn table(&self, station_id: StationId, table_number: i32) -> Option<TableRef> {
        self.tables
            .iter()
            .find(|t| t.station_id == station_id && t.table_number == table_number)
            .copied()
    }

    fn all_tables(&self) -> Vec<TableRef> {
        self.tables.clone()
    }
}

// ============================================================================
// ASSIGNMENT REGISTRY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    assignments: Vec<WitnessAssignment>,
}

/// Witness assignments held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    assignments: Vec<WitnessAssignment>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ProviderFileError> {
        let contents = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&contents)?;
        Ok(Self {
            assignments: file.assignments,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ProviderFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = RegistryFile {
            assignments: self.assignments.clone(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn assign(&mut self, assignment: WitnessAssignment) {
        self.assignments.push(assignment);
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

impl AssignmentRegistry for StaticRegistry {
    fn assignments_for_reporter(&self, reporter_id: ReporterId) -> Vec<WitnessAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.reporter_id == reporter_id)
            .cloned()
            .collect()
    }

    fn assignments_for_station(&self, station_id: StationId) -> Vec<WitnessAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.station_id == station_id)
            .cloned()
            .collect()
    }

    fn all_assignments(&self) -> Vec<WitnessAssignment> {
        self.assignments.clone()
    }
}

// ============================================================================
// IDENTITY PROVIDER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityFile {
    tokens: HashMap<String, CallerIdentity>,
}

/// Bearer-token identity set held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ProviderFileError> {
        let contents = std::fs::read_to_string(path)?;
        let file: IdentityFile = serde_json::from_str(&contents)?;
        Ok(Self {
            tokens: file.tokens,
        })
    }

    pub fn register(&mut self, token: &str, caller: CallerIdentity) {
        self.tokens.insert(token.to_string(), caller);
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn authenticate(&self, token: &str) -> Option<CallerIdentity> {
        self.tokens.get(token).cloned()
    }

    fn reporter(&self, reporter_id: ReporterId) -> Option<CallerIdentity> {
        self.tokens
            .values()
            .find(|c| c.reporter_id == reporter_id)
            .cloned()
    }
}
