//! Core entity structures

use crate::{
    // ID types
    EntityIdType, LocalSubmissionId, MunicipalityId, ReportId, ReporterId, StationId,
    // Other types
    AggregateScope, AttentionReason, ContentHash, IrregularityType, PendingState, Timestamp,
    // Errors
    TallyError,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// VOTE TALLY
// ============================================================================

/// Counts copied from one table's signed acta.
///
/// `votes_registered` is the count of valid candidate ballots at the table;
/// blank and null ballots are tracked separately and enter the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VoteTally {
    pub votes_registered: i32,
    pub votes_candidate: i32,
    pub votes_blank: i32,
    pub votes_null: i32,
}

impl VoteTally {
    pub fn new(registered: i32, candidate: i32, blank: i32, null: i32) -> Self {
        Self {
            votes_registered: registered,
            votes_candidate: candidate,
            votes_blank: blank,
            votes_null: null,
        }
    }

    /// Total ballots cast at the table.
    pub fn total_votes(&self) -> i32 {
        self.votes_registered + self.votes_blank + self.votes_null
    }

    /// Check the numeric invariants every accepted tally must satisfy.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.votes_registered < 0 {
            return Err(TallyError::NegativeCount {
                field: "votes_registered",
                value: self.votes_registered,
            });
        }
        if self.votes_candidate < 0 {
            return Err(TallyError::NegativeCount {
                field: "votes_candidate",
                value: self.votes_candidate,
            });
        }
        if self.votes_blank < 0 {
            return Err(TallyError::NegativeCount {
                field: "votes_blank",
                value: self.votes_blank,
            });
        }
        if self.votes_null < 0 {
            return Err(TallyError::NegativeCount {
                field: "votes_null",
                value: self.votes_null,
            });
        }
        if self.votes_candidate > self.votes_registered {
            return Err(TallyError::CandidateExceedsRegistered {
                candidate: self.votes_candidate,
                registered: self.votes_registered,
            });
        }
        Ok(())
    }
}

// ============================================================================
// REPORT SUBMISSION
// ============================================================================

/// The payload a reporter sends for one table.
///
/// This is the unit the offline queue persists and the gateway hashes for
/// the byte-for-byte resubmission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReportSubmission {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    pub table_number: i32,
    pub tally: VoteTally,
    pub has_irregularities: bool,
    pub irregularity_type: Option<IrregularityType>,
    pub irregularity_details: Option<String>,
    pub observations: Option<String>,
}

impl ReportSubmission {
    pub fn new(station_id: StationId, table_number: i32, tally: VoteTally) -> Self {
        Self {
            station_id,
            table_number,
            tally,
            has_irregularities: false,
            irregularity_type: None,
            irregularity_details: None,
            observations: None,
        }
    }

    /// Attach an irregularity flag with its classification and details.
    pub fn with_irregularity(mut self, kind: IrregularityType, details: &str) -> Self {
        self.has_irregularities = true;
        self.irregularity_type = Some(kind);
        self.irregularity_details = Some(details.to_string());
        self
    }

    /// Attach free-text observations.
    pub fn with_observations(mut self, observations: &str) -> Self {
        self.observations = Some(observations.to_string());
        self
    }

    /// Check everything the gateway enforces before persisting: numeric
    /// invariants plus a classified irregularity whenever the flag is set.
    pub fn validate(&self) -> Result<(), TallyError> {
        self.tally.validate()?;
        if self.has_irregularities && self.irregularity_type.is_none() {
            return Err(TallyError::MissingIrregularityType);
        }
        Ok(())
    }

    /// Canonical byte encoding used for payload identity.
    ///
    /// Fixed field order, length-prefixed text fields. Two submissions hash
    /// equal exactly when every field matches.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        fn push_text(buf: &mut Vec<u8>, text: &Option<String>) {
            match text {
                Some(s) => {
                    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
                None => buf.extend_from_slice(&u32::MAX.to_be_bytes()),
            }
        }

        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(self.station_id.as_uuid().as_bytes());
        buf.extend_from_slice(&self.table_number.to_be_bytes());
        buf.extend_from_slice(&self.tally.votes_registered.to_be_bytes());
        buf.extend_from_slice(&self.tally.votes_candidate.to_be_bytes());
        buf.extend_from_slice(&self.tally.votes_blank.to_be_bytes());
        buf.extend_from_slice(&self.tally.votes_null.to_be_bytes());
        buf.push(self.has_irregularities as u8);
        buf.push(match self.irregularity_type {
            None => 0,
            Some(IrregularityType::MissingBallots) => 1,
            Some(IrregularityType::CountMismatch) => 2,
            Some(IrregularityType::TamperedSeal) => 3,
            Some(IrregularityType::WitnessExpelled) => 4,
            Some(IrregularityType::ProcedureViolation) => 5,
            Some(IrregularityType::Other) => 6,
        });
        push_text(&mut buf, &self.irregularity_details);
        push_text(&mut buf, &self.observations);
        buf
    }

    /// SHA-256 over the canonical encoding.
    pub fn payload_hash(&self) -> ContentHash {
        crate::compute_payload_hash(&self.canonical_bytes())
    }
}

// ============================================================================
// TABLE REPORT
// ============================================================================

/// One table's recorded result. Immutable after submission except for the
/// validation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TableReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub report_id: ReportId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    pub table_number: i32,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub reporter_id: ReporterId,
    pub tally: VoteTally,
    pub has_irregularities: bool,
    pub irregularity_type: Option<IrregularityType>,
    pub irregularity_details: Option<String>,
    pub observations: Option<String>,
    /// SHA-256 of the canonical submission payload, hex-encoded on the wire.
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    #[serde(with = "serde_bytes_hash")]
    pub payload_hash: ContentHash,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub reported_at: Timestamp,
    pub is_validated: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub validated_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub validated_by: Option<ReporterId>,
}

impl TableReport {
    /// Materialize a stored report from an accepted submission.
    pub fn from_submission(
        submission: &ReportSubmission,
        reporter_id: ReporterId,
        reported_at: Timestamp,
    ) -> Self {
        Self {
            report_id: ReportId::now_v7(),
            station_id: submission.station_id,
            table_number: submission.table_number,
            reporter_id,
            tally: submission.tally,
            has_irregularities: submission.has_irregularities,
            irregularity_type: submission.irregularity_type,
            irregularity_details: submission.irregularity_details.clone(),
            observations: submission.observations.clone(),
            payload_hash: submission.payload_hash(),
            reported_at,
            is_validated: false,
            validated_at: None,
            validated_by: None,
        }
    }

    /// True when the submission carries byte-for-byte the same payload.
    pub fn matches_payload(&self, submission: &ReportSubmission) -> bool {
        self.payload_hash == submission.payload_hash()
    }

    /// Flip the validation mark. Reversible; never touches vote counts.
    pub fn set_validated(&mut self, value: bool, supervisor: ReporterId, at: Timestamp) {
        self.is_validated = value;
        if value {
            self.validated_at = Some(at);
            self.validated_by = Some(supervisor);
        } else {
            self.validated_at = None;
            self.validated_by = None;
        }
    }
}

/// Hex serde for the 32-byte payload hash.
mod serde_bytes_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(64);
        for byte in hash {
            out.push_str(&format!("{:02x}", byte));
        }
        serializer.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.len() != 64 {
            return Err(serde::de::Error::custom("payload hash must be 64 hex chars"));
        }
        let mut hash = [0u8; 32];
        for (i, chunk) in text.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(serde::de::Error::custom)?;
            hash[i] = u8::from_str_radix(hex, 16).map_err(serde::de::Error::custom)?;
        }
        Ok(hash)
    }
}

// ============================================================================
// ASSIGNMENTS
// ============================================================================

/// Which tables of one station a witness is responsible for.
/// Owned by the assignment registry; read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WitnessAssignment {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub reporter_id: ReporterId,
    pub reporter_name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    /// Between one and five tables per assignment.
    pub table_numbers: Vec<i32>,
}

impl WitnessAssignment {
    pub fn new(
        reporter_id: ReporterId,
        reporter_name: &str,
        station_id: StationId,
        table_numbers: Vec<i32>,
    ) -> Self {
        Self {
            reporter_id,
            reporter_name: reporter_name.to_string(),
            station_id,
            table_numbers,
        }
    }

    /// Does this assignment cover the given table?
    pub fn covers(&self, station_id: StationId, table_number: i32) -> bool {
        self.station_id == station_id && self.table_numbers.contains(&table_number)
    }

    pub fn table_count(&self) -> usize {
        self.table_numbers.len()
    }
}

// ============================================================================
// PENDING SUBMISSION (CLIENT)
// ============================================================================

/// A submission waiting on a field device for delivery to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub local_id: LocalSubmissionId,
    pub payload: ReportSubmission,
    pub created_at: Timestamp,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<Timestamp>,
    pub state: PendingState,
}

impl PendingSubmission {
    pub fn new(payload: ReportSubmission, created_at: Timestamp) -> Self {
        Self {
            local_id: LocalSubmissionId::now_v7(),
            payload,
            created_at,
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
            state: PendingState::Queued,
        }
    }

    /// Record one failed delivery attempt.
    pub fn record_failure(&mut self, error: &str, at: Timestamp) {
        self.retry_count += 1;
        self.last_error = Some(error.to_string());
        self.last_attempt_at = Some(at);
    }

    /// Park the item for manual review; it leaves the retry rotation.
    pub fn mark_attention(&mut self, reason: AttentionReason, error: &str, at: Timestamp) {
        self.last_error = Some(error.to_string());
        self.last_attempt_at = Some(at);
        self.state = PendingState::NeedsAttention(reason);
    }

    /// Still eligible for automatic delivery?
    pub fn is_retryable(&self) -> bool {
        self.state == PendingState::Queued
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Rollup over one scope, derived from the report log.
///
/// Never the system of record: every field is recomputable from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AggregateSnapshot {
    pub scope: AggregateScope,
    pub tables_total: i64,
    pub tables_reported: i64,
    pub tables_validated: i64,
    pub votes_candidate_reported: i64,
    pub votes_total_reported: i64,
    pub votes_candidate_validated: i64,
    pub votes_total_validated: i64,
    /// Directory estimate of ballots expected across the scope.
    pub expected_votes_total: i64,
    /// Latest `reported_at` across the scope; `None` with no reports yet.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_updated_at: Option<Timestamp>,
    /// Report-log cursor this rollup was computed from.
    pub log_version: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub computed_at: Timestamp,
}

/// Candidate share of the total, as a percentage. Zero denominator maps to 0.
pub fn percentage(candidate: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        candidate as f64 / total as f64 * 100.0
    }
}

impl AggregateSnapshot {
    /// Empty rollup for a scope that has no tables or no reports yet.
    pub fn empty(scope: AggregateScope, computed_at: Timestamp) -> Self {
        Self {
            scope,
            tables_total: 0,
            tables_reported: 0,
            tables_validated: 0,
            votes_candidate_reported: 0,
            votes_total_reported: 0,
            votes_candidate_validated: 0,
            votes_total_validated: 0,
            expected_votes_total: 0,
            last_updated_at: None,
            log_version: 0,
            computed_at,
        }
    }

    pub fn tables_pending(&self) -> i64 {
        self.tables_total - self.tables_reported
    }

    /// Votes still unaccounted for against the directory estimate.
    pub fn pending_votes_total(&self) -> i64 {
        (self.expected_votes_total - self.votes_total_reported).max(0)
    }

    /// Upper bound on candidate votes still outstanding.
    pub fn pending_votes_candidate(&self) -> i64 {
        (self.expected_votes_total - self.votes_candidate_reported).max(0)
    }

    pub fn percentage_reported(&self) -> f64 {
        percentage(self.votes_candidate_reported, self.votes_total_reported)
    }

    pub fn percentage_validated(&self) -> f64 {
        percentage(self.votes_candidate_validated, self.votes_total_validated)
    }
}

// ============================================================================
// DIRECTORY REFERENCES
// ============================================================================

/// One voting table as the electoral directory describes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TableRef {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    pub table_number: i32,
    pub registered_voters: i32,
}

/// A polling station in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StationRef {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub municipality_id: MunicipalityId,
}

/// A municipality in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MunicipalityRef {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub municipality_id: MunicipalityId,
    pub name: String,
}

// ============================================================================
// COVERAGE
// ============================================================================

/// One table's witness-coverage picture, ranked by its weight in the count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TableCoverage {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    pub station_name: String,
    pub table_number: i32,
    pub registered_voters: i32,
    /// 1-based position in the ranked list.
    pub priority: i32,
    pub has_witness: bool,
    pub witness_count: i32,
    pub witness_names: Vec<String>,
    pub has_report: bool,
    /// High-voter table with no witness at all.
    pub critical_gap: bool,
}

/// Ranked coverage for one station's tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StationCoverage {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub station_id: StationId,
    pub station_name: String,
    pub tables: Vec<TableCoverage>,
}

/// A reporter assigned more tables than the configured maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OverloadedReporter {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub reporter_id: ReporterId,
    pub reporter_name: String,
    pub assigned_tables: i32,
}

/// Full coverage picture: the ranked table list, the same list grouped by
/// station, and the informational overload flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CoverageReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub generated_at: Timestamp,
    /// Every table, ranked by registered voters descending.
    pub tables: Vec<TableCoverage>,
    /// The ranked tables regrouped by station, stations ordered by their
    /// highest-priority table.
    pub stations: Vec<StationCoverage>,
    pub overloaded_reporters: Vec<OverloadedReporter>,
    pub critical_gap_count: usize,
}
