//! Tracing Initialization
//!
//! Structured logging for the server binary. The filter comes from the
//! `ESCRUTA_LOG` environment variable using the standard `tracing`
//! directive syntax, e.g. `info,escruta_engine=debug`.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// Later calls are no-ops; the first subscriber wins.
pub fn init_telemetry() {
    let filter = EnvFilter::try_from_env("ESCRUTA_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info,escruta_api=debug,tower_http=debug"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
