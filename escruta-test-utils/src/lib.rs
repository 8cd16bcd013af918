//! ESCRUTA Test Utilities
//!
//! Centralized test infrastructure for the ESCRUTA workspace:
//! - Proptest generators for the entity types
//! - In-process and fault-injecting transports for client-to-engine tests
//! - Fixtures for common electoral scenarios
//! - Assertions for domain-specific invariants

// Re-export the reference store from its source crate
pub use escruta_storage::InMemoryReportStore;

// Re-export core types for convenience
pub use escruta_core::{
    compute_payload_hash, percentage, AggregateScope, AggregateSnapshot, AssignmentRegistry,
    AttentionReason, CallerIdentity, CapabilitySet, ContentHash, CoverageConfig, CoverageReport,
    EntityIdType, EscrutaError, EscrutaResult, GatewayError, IrregularityType, LedgerError,
    LocalSubmissionId, MunicipalityId, PendingState, PendingSubmission, QueueConfig, QueueError,
    ReportId, ReportSubmission, ReporterId, StationId, StorageError, SyncConfig, TableDirectory,
    TableReport, TallyError, Timestamp, VoteTally, WitnessAssignment,
};

use async_trait::async_trait;
use escruta_api::ApiError;
use escruta_client::{GatewayTransport, SubmitReceipt, TransportError};
use escruta_engine::{ReportGateway, SubmitOutcome};
use escruta_storage::ReportStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// IN-PROCESS TRANSPORTS
// ============================================================================

/// Transport that delivers straight into a `ReportGateway`, bypassing HTTP.
///
/// Failures map through the same error conversion the REST layer uses, so a
/// client driven by this transport observes exactly the verdicts it would
/// see over the wire.
pub struct InProcessTransport {
    gateway: ReportGateway,
    caller: CallerIdentity,
    calls: AtomicUsize,
}

impl InProcessTransport {
    pub fn new(
        store: Arc<dyn ReportStore>,
        registry: Arc<dyn AssignmentRegistry>,
        caller: CallerIdentity,
    ) -> Self {
        Self {
            gateway: ReportGateway::new(store, registry),
            caller,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delivery attempts observed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayTransport for InProcessTransport {
    async fn submit(
        &self,
        submission: &ReportSubmission,
    ) -> Result<SubmitReceipt, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.gateway.submit(&self.caller, submission) {
            Ok(SubmitOutcome::Recorded(report)) => Ok(SubmitReceipt {
                report,
                newly_recorded: true,
            }),
            Ok(SubmitOutcome::AlreadyRecorded(report)) => Ok(SubmitReceipt {
                report,
                newly_recorded: false,
            }),
            Err(err) => {
                let api_error = ApiError::from(err);
                if api_error.code.is_retryable() {
                    Err(TransportError::Transient {
                        reason: format!("{}: {}", api_error.code, api_error.message),
                    })
                } else {
                    Err(TransportError::Rejected {
                        code: api_error.code,
                        message: api_error.message,
                    })
                }
            }
        }
    }
}

/// Wrapper that injects a fixed number of transient failures before
/// delegating to the inner transport.
pub struct FlakyTransport<T> {
    inner: T,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl<T> FlakyTransport<T> {
    pub fn new(inner: T, failures: usize) -> Self {
        Self {
            inner,
            failures_remaining: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: GatewayTransport> GatewayTransport for FlakyTransport<T> {
    async fn submit(
        &self,
        submission: &ReportSubmission,
    ) -> Result<SubmitReceipt, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(TransportError::Transient {
                reason: "Injected outage".to_string(),
            });
        }
        self.inner.submit(submission).await
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for ESCRUTA entity types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    // === Identity Generators ===

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a valid UUIDv7 (timestamp-sortable).
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    /// Generate a random ReporterId.
    pub fn arb_reporter_id() -> impl Strategy<Value = ReporterId> {
        arb_uuid().prop_map(ReporterId::new)
    }

    /// Generate a random ReportId.
    pub fn arb_report_id() -> impl Strategy<Value = ReportId> {
        arb_uuid().prop_map(ReportId::new)
    }

    /// Generate a random StationId.
    pub fn arb_station_id() -> impl Strategy<Value = StationId> {
        arb_uuid().prop_map(StationId::new)
    }

    /// Generate a random MunicipalityId.
    pub fn arb_municipality_id() -> impl Strategy<Value = MunicipalityId> {
        arb_uuid().prop_map(MunicipalityId::new)
    }

    /// Generate a random LocalSubmissionId.
    pub fn arb_local_submission_id() -> impl Strategy<Value = LocalSubmissionId> {
        arb_uuid().prop_map(LocalSubmissionId::new)
    }

    /// Generate a Timestamp within an election-plausible range (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_577_836_800i64..1_893_456_000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate a ContentHash (32 bytes).
    pub fn arb_content_hash() -> impl Strategy<Value = ContentHash> {
        any::<[u8; 32]>()
    }

    // === Domain Generators ===

    /// Generate a tally that satisfies the numeric invariants: nothing
    /// negative, candidate votes never above registered.
    pub fn arb_vote_tally() -> impl Strategy<Value = VoteTally> {
        (0i32..2000).prop_flat_map(|registered| {
            (Just(registered), 0..=registered, 0i32..120, 0i32..120)
                .prop_map(|(r, c, b, n)| VoteTally::new(r, c, b, n))
        })
    }

    /// Generate an irregularity classification.
    pub fn arb_irregularity_type() -> impl Strategy<Value = IrregularityType> {
        prop_oneof![
            Just(IrregularityType::MissingBallots),
            Just(IrregularityType::CountMismatch),
            Just(IrregularityType::TamperedSeal),
            Just(IrregularityType::WitnessExpelled),
            Just(IrregularityType::ProcedureViolation),
            Just(IrregularityType::Other),
        ]
    }

    /// Generate a reporter display name.
    pub fn arb_reporter_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "Nubia Cardozo",
            "Pedro Lemos",
            "Sofía Mena",
            "Laura Restrepo",
            "Jairo Espitia",
            "Carmen Anaya",
        ])
        .prop_map(str::to_string)
    }

    /// Generate a valid submission for one station, table numbers 1..=12.
    pub fn arb_submission(station_id: StationId) -> impl Strategy<Value = ReportSubmission> {
        (1i32..=12, arb_vote_tally())
            .prop_map(move |(table, tally)| ReportSubmission::new(station_id, table, tally))
    }

    /// Generate a valid submission with a random station.
    pub fn arb_submission_any() -> impl Strategy<Value = ReportSubmission> {
        arb_station_id().prop_flat_map(arb_submission)
    }

    /// Generate a stored report.
    pub fn arb_table_report() -> impl Strategy<Value = TableReport> {
        (arb_submission_any(), arb_reporter_id(), arb_timestamp()).prop_map(
            |(submission, reporter, at)| TableReport::from_submission(&submission, reporter, at),
        )
    }

    /// Generate an assignment covering one to five distinct tables.
    pub fn arb_witness_assignment(
        station_id: StationId,
    ) -> impl Strategy<Value = WitnessAssignment> {
        (
            arb_reporter_id(),
            arb_reporter_name(),
            prop::collection::btree_set(1i32..=12, 1..=5),
        )
            .prop_map(move |(reporter_id, name, tables)| {
                WitnessAssignment::new(
                    reporter_id,
                    &name,
                    station_id,
                    tables.into_iter().collect(),
                )
            })
    }

    /// Generate an aggregation scope.
    pub fn arb_aggregate_scope() -> impl Strategy<Value = AggregateScope> {
        prop_oneof![
            Just(AggregateScope::Global),
            arb_municipality_id()
                .prop_map(|municipality_id| AggregateScope::Municipality { municipality_id }),
            arb_station_id().prop_map(|station_id| AggregateScope::Station { station_id }),
            (arb_station_id(), 1i32..=12).prop_map(|(station_id, table_number)| {
                AggregateScope::Table {
                    station_id,
                    table_number,
                }
            }),
        ]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made electoral scenarios.

    use super::*;
    use escruta_engine::{StaticDirectory, StaticRegistry};

    /// Generate a witness identity (submit capability only).
    pub fn witness(name: &str) -> CallerIdentity {
        CallerIdentity::new(ReporterId::now_v7(), name, CapabilitySet::witness())
    }

    /// Generate a supervisor identity (submit and validate).
    pub fn supervisor(name: &str) -> CallerIdentity {
        CallerIdentity::new(ReporterId::now_v7(), name, CapabilitySet::supervisor())
    }

    /// One municipality, one station, tables numbered from 1 with the given
    /// registered-voter counts. The witness covers `witness_tables`.
    pub struct SmallElection {
        pub directory: StaticDirectory,
        pub registry: StaticRegistry,
        pub municipality_id: MunicipalityId,
        pub station_id: StationId,
        pub witness: CallerIdentity,
        pub supervisor: CallerIdentity,
    }

    pub fn small_election(voters_per_table: &[i32], witness_tables: Vec<i32>) -> SmallElection {
        let mut directory = StaticDirectory::new();
        let municipality_id = directory.add_municipality("Sahagún");
        let station_id = directory.add_station(municipality_id, "IE La Inmaculada");
        for (i, voters) in voters_per_table.iter().enumerate() {
            directory.add_table(station_id, (i + 1) as i32, *voters);
        }

        let witness = witness("Nubia Cardozo");
        let supervisor = supervisor("Sofía Mena");
        let mut registry = StaticRegistry::new();
        registry.assign(WitnessAssignment::new(
            witness.reporter_id,
            &witness.display_name,
            station_id,
            witness_tables,
        ));

        SmallElection {
            directory,
            registry,
            municipality_id,
            station_id,
            witness,
            supervisor,
        }
    }

    /// One municipality with several named stations; each station gets
    /// tables numbered from 1 with the given registered-voter counts.
    pub struct MunicipalityFixture {
        pub directory: StaticDirectory,
        pub municipality_id: MunicipalityId,
        pub stations: Vec<StationId>,
    }

    pub fn municipality(stations: &[(&str, &[i32])]) -> MunicipalityFixture {
        let mut directory = StaticDirectory::new();
        let municipality_id = directory.add_municipality("Montería");
        let mut station_ids = Vec::with_capacity(stations.len());
        for (name, voters_per_table) in stations {
            let station_id = directory.add_station(municipality_id, name);
            for (i, voters) in voters_per_table.iter().enumerate() {
                directory.add_table(station_id, (i + 1) as i32, *voters);
            }
            station_ids.push(station_id);
        }
        MunicipalityFixture {
            directory,
            municipality_id,
            stations: station_ids,
        }
    }

    /// A plain submission for one table: no irregularities, round counts
    /// derived from the table number so payloads differ per table.
    pub fn submission_for(station_id: StationId, table_number: i32) -> ReportSubmission {
        ReportSubmission::new(
            station_id,
            table_number,
            VoteTally::new(200 + table_number, 90 + table_number, 6, 3),
        )
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for domain-specific invariants.

    use super::*;

    /// Assert that a Result is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug, E: std::fmt::Debug>(result: &Result<T, E>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a Result is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug, E: std::fmt::Debug>(result: &Result<T, E>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert a submission bounced off the assignment check.
    #[track_caller]
    pub fn assert_not_assigned<T: std::fmt::Debug>(result: &Result<T, GatewayError>) {
        match result {
            Err(GatewayError::NotAssigned { .. }) => {}
            other => panic!("Expected NotAssigned, got: {:?}", other),
        }
    }

    /// Assert a divergent resubmission was rejected, keeping the named
    /// winner in place.
    #[track_caller]
    pub fn assert_already_reported<T: std::fmt::Debug>(
        result: &Result<T, GatewayError>,
        winner: ReportId,
    ) {
        match result {
            Err(GatewayError::AlreadyReported { existing_id, .. }) => {
                assert_eq!(
                    *existing_id,
                    winner.as_uuid(),
                    "Wrong winning report in AlreadyReported"
                );
            }
            other => panic!("Expected AlreadyReported, got: {:?}", other),
        }
    }

    /// Assert a submission failed the tally invariants.
    #[track_caller]
    pub fn assert_validation_rejected<T: std::fmt::Debug>(result: &Result<T, GatewayError>) {
        match result {
            Err(GatewayError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert the arithmetic invariants of a rollup: the validated subset
    /// never exceeds the reported set, candidate votes never exceed totals,
    /// percentages stay in range, and pending figures complement reported.
    #[track_caller]
    pub fn assert_rollup_consistent(snapshot: &AggregateSnapshot) {
        assert!(snapshot.tables_validated <= snapshot.tables_reported);
        assert!(snapshot.tables_reported <= snapshot.tables_total);
        assert!(snapshot.votes_candidate_reported <= snapshot.votes_total_reported);
        assert!(snapshot.votes_candidate_validated <= snapshot.votes_total_validated);
        assert!(snapshot.votes_total_validated <= snapshot.votes_total_reported);
        assert_eq!(
            snapshot.tables_pending(),
            snapshot.tables_total - snapshot.tables_reported
        );
        assert!(snapshot.pending_votes_total() >= 0);
        assert!(snapshot.pending_votes_candidate() >= 0);
        for pct in [snapshot.percentage_reported(), snapshot.percentage_validated()] {
            assert!((0.0..=100.0).contains(&pct), "Percentage out of range: {pct}");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
