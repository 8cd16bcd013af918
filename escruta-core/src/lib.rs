//! ESCRUTA Core - Electoral results data model
//!
//! Shared types for the results synchronization and aggregation engine:
//! table reports and their tallies, witness assignments, aggregate rollups,
//! coverage records, caller capabilities, and the error taxonomy.
//!
//! # Key Types
//!
//! - `TableReport`: one table's immutable recorded result
//! - `ReportSubmission`: the payload a reporter sends for one table
//! - `VoteTally`: the counts copied from the signed acta
//! - `AggregateSnapshot`: derived rollup over a scope, never authoritative
//! - `PendingSubmission`: client-side queued work surviving restarts
//! - `CapabilitySet`: what an authenticated caller may do
//!
//! # Design
//!
//! The report log is the single system of record. Everything else
//! (aggregates, coverage) is a projection recomputed from it.

mod capability;
mod config;
mod entities;
mod enums;
mod error;
mod identity;
mod providers;

pub use capability::{CallerIdentity, CapabilitySet};
pub use config::{CoverageConfig, QueueConfig, SyncConfig};
pub use entities::{
    percentage, AggregateSnapshot, CoverageReport, MunicipalityRef, OverloadedReporter,
    PendingSubmission, ReportSubmission, StationCoverage, StationRef, TableCoverage, TableRef,
    TableReport, VoteTally, WitnessAssignment,
};
pub use enums::{AggregateScope, AttentionReason, IrregularityType, PendingState};
pub use error::{
    ConfigError, EngineError, EscrutaError, EscrutaResult, GatewayError, LedgerError, QueueError,
    StorageError, TallyError,
};
pub use identity::{
    compute_payload_hash, ContentHash, EntityIdType, LocalSubmissionId, MunicipalityId, ReportId,
    ReporterId, StationId, Timestamp,
};
pub use providers::{AssignmentRegistry, IdentityProvider, TableDirectory};
