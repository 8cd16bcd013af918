//! ESCRUTA API - REST/WebSocket API Layer
//!
//! This crate provides the HTTP surface of the ESCRUTA results engine.
//! It exposes REST endpoints (Axum) for report submission, validation,
//! aggregation, and coverage, plus a WebSocket connection for real-time
//! event streaming.
//!
//! The API layer drives the gateway, ledger, and aggregation engine from
//! escruta-engine over a shared report store.

pub mod config;
pub mod error;
pub mod events;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod telemetry;
pub mod types;
pub mod ws;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use events::WsEvent;
pub use middleware::{auth_middleware, AuthState, CallerExtractor};
pub use openapi::ApiDoc;
pub use routes::{build_cors_layer, create_api_router};
pub use telemetry::init_telemetry;
pub use types::*;
pub use ws::WsState;
