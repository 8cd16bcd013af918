//! API Request and Response Types
//!
//! Request and response bodies for the ESCRUTA REST API. Stored entities
//! (`TableReport`, `CoverageReport`) serialize directly as responses; this
//! module adds the write-side envelopes and the derived aggregate view.

use escruta_core::{
    AggregateScope, AggregateSnapshot, IrregularityType, ReportSubmission, StationId, TableReport,
    Timestamp, VoteTally,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// REPORT TYPES
// ============================================================================

/// Request to submit one table's tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitReportRequest {
    /// Station the table belongs to
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    /// Table number within the station (1-based)
    pub table_number: i32,
    /// Valid ballots cast at the table
    pub votes_registered: i32,
    /// Ballots for the tracked candidate, never above `votes_registered`
    pub votes_candidate: i32,
    /// Blank ballots
    pub votes_blank: i32,
    /// Null ballots
    pub votes_null: i32,
    /// Irregularity flag; requires `irregularity_type` when set
    #[serde(default)]
    pub has_irregularities: bool,
    /// Classification of the irregularity
    #[serde(default)]
    pub irregularity_type: Option<IrregularityType>,
    /// Free-text description of the irregularity
    #[serde(default)]
    pub irregularity_details: Option<String>,
    /// Free-text observations from the witness
    #[serde(default)]
    pub observations: Option<String>,
}

impl SubmitReportRequest {
    /// Domain submission this request describes.
    pub fn into_submission(self) -> ReportSubmission {
        ReportSubmission {
            station_id: self.station_id,
            table_number: self.table_number,
            tally: VoteTally {
                votes_registered: self.votes_registered,
                votes_candidate: self.votes_candidate,
                votes_blank: self.votes_blank,
                votes_null: self.votes_null,
            },
            has_irregularities: self.has_irregularities,
            irregularity_type: self.irregularity_type,
            irregularity_details: self.irregularity_details,
            observations: self.observations,
        }
    }
}

/// Reports recorded for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListReportsResponse {
    /// Reports ordered by table number
    pub reports: Vec<TableReport>,
    /// Total count
    pub total: i32,
}

/// Request to set or clear a report's validation mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetValidationRequest {
    /// `true` marks the report validated; `false` reverts it
    pub is_validated: bool,
}

// ============================================================================
// AGGREGATE TYPES
// ============================================================================

/// Query parameters selecting the aggregation scope.
///
/// Precedence: `table_number` (with `station_id`) over `station_id` over
/// `municipality_id`; no parameters means the global rollup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AggregateQuery {
    pub municipality_id: Option<String>,
    pub station_id: Option<String>,
    pub table_number: Option<i32>,
}

/// Rollup for one scope, extended with the derived pending and percentage
/// figures clients would otherwise recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AggregateResponse {
    /// Scope this rollup covers
    pub scope: AggregateScope,
    /// Tables the directory lists in the scope
    pub tables_total: i64,
    /// Tables with a recorded report
    pub tables_reported: i64,
    /// Tables whose report carries the validation mark
    pub tables_validated: i64,
    /// Tables with no report yet
    pub tables_pending: i64,
    /// Candidate votes across reported tables
    pub votes_candidate_reported: i64,
    /// Total ballots across reported tables
    pub votes_total_reported: i64,
    /// Candidate votes across validated tables
    pub votes_candidate_validated: i64,
    /// Total ballots across validated tables
    pub votes_total_validated: i64,
    /// Directory estimate of ballots expected across the scope
    pub expected_votes_total: i64,
    /// Ballots still unaccounted for against the directory estimate
    pub pending_votes_total: i64,
    /// Candidate share of reported ballots, as a percentage
    pub percentage_reported: f64,
    /// Candidate share of validated ballots, as a percentage
    pub percentage_validated: f64,
    /// Latest `reported_at` across the scope
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_updated_at: Option<Timestamp>,
    /// Report-log cursor the rollup was computed from
    pub log_version: u64,
    /// When the rollup was computed
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub computed_at: Timestamp,
}

impl From<AggregateSnapshot> for AggregateResponse {
    fn from(snapshot: AggregateSnapshot) -> Self {
        Self {
            tables_pending: snapshot.tables_pending(),
            pending_votes_total: snapshot.pending_votes_total(),
            percentage_reported: snapshot.percentage_reported(),
            percentage_validated: snapshot.percentage_validated(),
            scope: snapshot.scope,
            tables_total: snapshot.tables_total,
            tables_reported: snapshot.tables_reported,
            tables_validated: snapshot.tables_validated,
            votes_candidate_reported: snapshot.votes_candidate_reported,
            votes_total_reported: snapshot.votes_total_reported,
            votes_candidate_validated: snapshot.votes_candidate_validated,
            votes_total_validated: snapshot.votes_total_validated,
            expected_votes_total: snapshot.expected_votes_total,
            last_updated_at: snapshot.last_updated_at,
            log_version: snapshot.log_version,
            computed_at: snapshot.computed_at,
        }
    }
}
