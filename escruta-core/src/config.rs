//! Configuration types

use crate::{ConfigError, EscrutaError, EscrutaResult};
use serde::{Deserialize, Serialize};

/// Coverage analysis thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CoverageConfig {
    /// Tables with at least this many registered voters and no witness are
    /// flagged as critical gaps.
    pub critical_voter_threshold: i32,
    /// A reporter assigned more than this many tables is flagged overloaded.
    pub max_tables_per_witness: usize,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            critical_voter_threshold: 350,
            max_tables_per_witness: 5,
        }
    }
}

impl CoverageConfig {
    pub fn validate(&self) -> EscrutaResult<()> {
        if self.critical_voter_threshold < 0 {
            return Err(EscrutaError::Config(ConfigError::InvalidValue {
                field: "critical_voter_threshold".to_string(),
                value: self.critical_voter_threshold.to_string(),
                reason: "threshold must not be negative".to_string(),
            }));
        }
        if self.max_tables_per_witness == 0 {
            return Err(EscrutaError::Config(ConfigError::InvalidValue {
                field: "max_tables_per_witness".to_string(),
                value: "0".to_string(),
                reason: "a reporter must be allowed at least one table".to_string(),
            }));
        }
        Ok(())
    }
}

/// Offline queue limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Hard cap on queued items; enqueue beyond this fails loudly.
    pub max_items: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_items: 64 }
    }
}

/// Retry and pacing policy for the sync coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Per-request timeout for one gateway call.
    pub submit_timeout_ms: u64,
    /// First retry delay after a transient failure.
    pub initial_backoff_ms: u64,
    /// Backoff growth factor per consecutive failure.
    pub backoff_multiplier: f64,
    /// Ceiling on the computed delay.
    pub max_backoff_ms: u64,
    /// Random jitter added to each delay.
    pub jitter_ms: u64,
    /// Transient failures beyond this count park the item for manual review.
    pub retry_ceiling: u32,
    /// Periodic sync cadence while online.
    pub sync_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 10_000,
            initial_backoff_ms: 2_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 300_000,
            jitter_ms: 500,
            retry_ceiling: 8,
            sync_interval_ms: 30_000,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> EscrutaResult<()> {
        if self.backoff_multiplier < 1.0 {
            return Err(EscrutaError::Config(ConfigError::InvalidValue {
                field: "backoff_multiplier".to_string(),
                value: self.backoff_multiplier.to_string(),
                reason: "multiplier below 1.0 would shrink delays".to_string(),
            }));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(EscrutaError::Config(ConfigError::InvalidValue {
                field: "max_backoff_ms".to_string(),
                value: self.max_backoff_ms.to_string(),
                reason: "ceiling is below the initial delay".to_string(),
            }));
        }
        if self.retry_ceiling == 0 {
            return Err(EscrutaError::Config(ConfigError::InvalidValue {
                field: "retry_ceiling".to_string(),
                value: "0".to_string(),
                reason: "at least one retry must be allowed".to_string(),
            }));
        }
        Ok(())
    }
}
