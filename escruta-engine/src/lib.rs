//! ESCRUTA Engine - Results synchronization and aggregation core
//!
//! Server-side components over the report log:
//!
//! - `ReportGateway`: the single entry point for submissions, enforcing
//!   assignment, tally invariants, and the one-report-per-table rule
//! - `ValidationLedger`: reversible supervisor validation marks
//! - `AggregationEngine`: reported/validated rollups per scope, recomputed
//!   from a consistent log snapshot
//! - `CoverageAnalyzer`: ranked witness-coverage gaps
//!
//! Static, file-loadable implementations of the external collaborators
//! (directory, registry, identities) live in `providers`.

mod aggregation;
mod coverage;
mod gateway;
mod ledger;
mod providers;

pub use aggregation::AggregationEngine;
pub use coverage::CoverageAnalyzer;
pub use gateway::{ReportGateway, SubmitOutcome};
pub use ledger::ValidationLedger;
pub use providers::{
    ProviderFileError, StaticDirectory, StaticIdentityProvider, StaticRegistry,
};
