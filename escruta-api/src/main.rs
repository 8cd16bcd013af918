//! ESCRUTA API Server Entry Point
//!
//! Bootstraps configuration, loads the table directory, witness assignments,
//! and reporter identities from their provisioning files, and starts the
//! Axum HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use escruta_api::telemetry::init_telemetry;
use escruta_api::ws::WsState;
use escruta_api::{create_api_router, ApiConfig, ApiError, ApiResult};
use escruta_engine::{StaticDirectory, StaticIdentityProvider, StaticRegistry};
use escruta_storage::InMemoryReportStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_telemetry();

    let config = ApiConfig::from_env();

    let directory_path = require_path(config.directory_path.clone(), "ESCRUTA_DIRECTORY_PATH")?;
    let assignments_path =
        require_path(config.assignments_path.clone(), "ESCRUTA_ASSIGNMENTS_PATH")?;
    let identities_path = require_path(config.identities_path.clone(), "ESCRUTA_IDENTITIES_PATH")?;

    let directory = Arc::new(StaticDirectory::load(&directory_path).map_err(|e| {
        ApiError::internal_error(format!(
            "Failed to load table directory from {}: {}",
            directory_path.display(),
            e
        ))
    })?);
    let registry = Arc::new(StaticRegistry::load(&assignments_path).map_err(|e| {
        ApiError::internal_error(format!(
            "Failed to load witness assignments from {}: {}",
            assignments_path.display(),
            e
        ))
    })?);
    let identities = Arc::new(StaticIdentityProvider::load(&identities_path).map_err(|e| {
        ApiError::internal_error(format!(
            "Failed to load reporter identities from {}: {}",
            identities_path.display(),
            e
        ))
    })?);

    let store = Arc::new(InMemoryReportStore::new());
    let ws = Arc::new(WsState::new(config.ws_capacity));

    let app: Router = create_api_router(store, directory, registry, identities, ws, &config)?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting ESCRUTA API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn require_path(path: Option<PathBuf>, var: &str) -> ApiResult<PathBuf> {
    path.ok_or_else(|| {
        ApiError::internal_error(format!("{} must point to a provisioning file", var))
    })
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("ESCRUTA_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("ESCRUTA_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::validation_failed(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::validation_failed(format!("Invalid bind address {}: {}", addr, e)))
}
