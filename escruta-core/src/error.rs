//! Error types for ESCRUTA operations

use thiserror::Error;
use uuid::Uuid;

/// Numeric invariant violations in a submitted tally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    #[error("Negative count for {field}: {value}")]
    NegativeCount { field: &'static str, value: i32 },

    #[error("Candidate votes ({candidate}) exceed registered votes ({registered})")]
    CandidateExceedsRegistered { candidate: i32, registered: i32 },

    #[error("Submission flags irregularities but carries no irregularity type")]
    MissingIrregularityType,
}

/// Report store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Report not found: {id}")]
    ReportNotFound { id: Uuid },

    #[error("Table {table_number} at station {station_id} already has report {existing_id}")]
    DuplicateReport {
        station_id: Uuid,
        table_number: i32,
        existing_id: Uuid,
    },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Submission gateway errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Reporter {reporter_id} is not assigned to table {table_number} at station {station_id}")]
    NotAssigned {
        reporter_id: Uuid,
        station_id: Uuid,
        table_number: i32,
    },

    #[error("Invalid tally: {0}")]
    Validation(#[from] TallyError),

    #[error(
        "Table {table_number} at station {station_id} already reported with a different payload"
    )]
    AlreadyReported {
        station_id: Uuid,
        table_number: i32,
        existing_id: Uuid,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Validation ledger errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("No report exists yet for id {report_id}")]
    NotReported { report_id: Uuid },

    #[error("Caller {caller_id} lacks the validate capability")]
    CapabilityDenied { caller_id: Uuid },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Aggregation and coverage engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Unknown municipality: {municipality_id}")]
    UnknownMunicipality { municipality_id: Uuid },

    #[error("Unknown station: {station_id}")]
    UnknownStation { station_id: Uuid },

    #[error("Unknown table {table_number} at station {station_id}")]
    UnknownTable {
        station_id: Uuid,
        table_number: i32,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Offline queue errors (client-resident).
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Local queue full: {capacity} items")]
    QuotaExceeded { capacity: usize },

    #[error("Queued item not found: {local_id}")]
    UnknownItem { local_id: Uuid },

    #[error("Queue file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue file serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Queue lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all ESCRUTA errors.
#[derive(Debug, Error)]
pub enum EscrutaError {
    #[error("Tally error: {0}")]
    Tally(#[from] TallyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for ESCRUTA operations.
pub type EscrutaResult<T> = Result<T, EscrutaError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display_not_assigned() {
        let err = GatewayError::NotAssigned {
            reporter_id: Uuid::nil(),
            station_id: Uuid::nil(),
            table_number: 7,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("not assigned"));
        assert!(msg.contains("7"));
    }

    #[test]
    fn test_tally_error_display_candidate_exceeds() {
        let err = TallyError::CandidateExceedsRegistered {
            candidate: 130,
            registered: 120,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("130"));
        assert!(msg.contains("120"));
    }

    #[test]
    fn test_storage_error_display_duplicate() {
        let err = StorageError::DuplicateReport {
            station_id: Uuid::nil(),
            table_number: 3,
            existing_id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("already has report"));
    }

    #[test]
    fn test_queue_error_display_quota() {
        let err = QueueError::QuotaExceeded { capacity: 64 };
        let msg = format!("{}", err);
        assert!(msg.contains("64"));
    }

    #[test]
    fn test_master_error_wraps_components() {
        let tally = TallyError::NegativeCount {
            field: "votes_blank",
            value: -2,
        };
        let wrapped: EscrutaError = GatewayError::from(tally).into();
        let msg = format!("{}", wrapped);
        assert!(msg.contains("Gateway error"));
        assert!(msg.contains("votes_blank"));
    }
}
