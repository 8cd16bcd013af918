//! Enum types for ESCRUTA entities

use crate::identity::{MunicipalityId, StationId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// REPORT ENUMS
// ============================================================================

/// Classification of an irregularity flagged on a table report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum IrregularityType {
    /// Fewer ballots in the urn than the registry says were issued
    MissingBallots,
    /// Tally totals disagree with the signed acta
    CountMismatch,
    /// The urn or envelope seal was broken or substituted
    TamperedSeal,
    /// A witness was expelled from the table during the count
    WitnessExpelled,
    /// Table officials deviated from the counting procedure
    ProcedureViolation,
    /// Anything else, described in the free-text details
    Other,
}

/// Aggregation level requested from the results engine.
///
/// The serialized form is tagged so clients can pass the scope as a
/// single query object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum AggregateScope {
    /// Every table in the election.
    Global,
    /// All tables in the stations of one municipality.
    Municipality {
        #[cfg_attr(
            feature = "openapi",
            schema(value_type = String, format = "uuid")
        )]
        municipality_id: MunicipalityId,
    },
    /// All tables of one polling station.
    Station {
        #[cfg_attr(
            feature = "openapi",
            schema(value_type = String, format = "uuid")
        )]
        station_id: StationId,
    },
    /// A single voting table.
    Table {
        #[cfg_attr(
            feature = "openapi",
            schema(value_type = String, format = "uuid")
        )]
        station_id: StationId,
        table_number: i32,
    },
}

// ============================================================================
// CLIENT QUEUE ENUMS
// ============================================================================

/// Lifecycle state of a queued submission on a field device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PendingState {
    /// Waiting for the next sync pass (or mid-retry).
    #[default]
    Queued,
    /// Removed from automatic retry; the reporter must intervene.
    NeedsAttention(AttentionReason),
}

/// Why a queued submission was parked for manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttentionReason {
    /// Server already holds a different tally for the same table.
    ConflictDivergent,
    /// Server rejected the payload permanently (validation, assignment).
    Rejected,
    /// Transient failures exhausted the retry ceiling.
    RetryLimitReached,
}

// ============================================================================
// STRING CONVERSIONS
// ============================================================================

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for IrregularityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            IrregularityType::MissingBallots => "MissingBallots",
            IrregularityType::CountMismatch => "CountMismatch",
            IrregularityType::TamperedSeal => "TamperedSeal",
            IrregularityType::WitnessExpelled => "WitnessExpelled",
            IrregularityType::ProcedureViolation => "ProcedureViolation",
            IrregularityType::Other => "Other",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for IrregularityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "missingballots" => Ok(IrregularityType::MissingBallots),
            "countmismatch" => Ok(IrregularityType::CountMismatch),
            "tamperedseal" => Ok(IrregularityType::TamperedSeal),
            "witnessexpelled" => Ok(IrregularityType::WitnessExpelled),
            "procedureviolation" => Ok(IrregularityType::ProcedureViolation),
            "other" => Ok(IrregularityType::Other),
            _ => Err(format!("Invalid IrregularityType: {}", s)),
        }
    }
}

impl fmt::Display for AttentionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AttentionReason::ConflictDivergent => "ConflictDivergent",
            AttentionReason::Rejected => "Rejected",
            AttentionReason::RetryLimitReached => "RetryLimitReached",
        };
        write!(f, "{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::EntityIdType;

    #[test]
    fn irregularity_type_parses_loose_tokens() {
        assert_eq!(
            "count_mismatch".parse::<IrregularityType>().unwrap(),
            IrregularityType::CountMismatch
        );
        assert_eq!(
            "Tampered Seal".parse::<IrregularityType>().unwrap(),
            IrregularityType::TamperedSeal
        );
        assert!("ballot-stuffing".parse::<IrregularityType>().is_err());
    }

    #[test]
    fn aggregate_scope_serializes_tagged() {
        let scope = AggregateScope::Global;
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["level"], "global");

        let scope = AggregateScope::Table {
            station_id: StationId::nil(),
            table_number: 3,
        };
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["level"], "table");
        assert_eq!(json["table_number"], 3);
    }
}
