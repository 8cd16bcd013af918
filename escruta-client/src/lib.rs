//! ESCRUTA Client - Offline queue and sync for field devices
//!
//! Reporters capture tallies wherever they are; connectivity is optional.
//! Submissions land in the file-backed `OfflineQueue` (survives restarts,
//! enforces a hard capacity) and drain through a `GatewayTransport` when
//! the `SyncCoordinator` runs a pass. Server verdicts are terminal and
//! park the item for manual review; transient failures retry with
//! exponential backoff up to the retry ceiling. No submission is ever
//! silently dropped.

mod config;
mod queue;
mod sync;
mod transport;

pub use config::{ClientConfig, ConfigError};
pub use queue::{OfflineQueue, QueueStats};
pub use sync::{SyncCoordinator, SyncOutcome, SyncReport};
pub use transport::{GatewayTransport, HttpGatewayTransport, SubmitReceipt, TransportError};
