//! HTTP route handlers for the ESCRUTA API.
//!
//! Routes are organized by resource, with each resource having its own module.
//! `create_api_router` assembles them into a single router with authentication,
//! CORS, and request tracing applied.

use std::sync::Arc;

use axum::http::{header, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use escruta_core::{
    AssignmentRegistry, CoverageConfig, IdentityProvider, TableDirectory,
};
use escruta_engine::{AggregationEngine, CoverageAnalyzer};
use escruta_storage::ReportStore;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthState};
use crate::openapi::ApiDoc;
use crate::ws::{self, WsState};

pub mod aggregate;
pub mod coverage;
pub mod health;
pub mod report;
pub mod station;

pub use aggregate::create_router as aggregate_router;
pub use coverage::create_router as coverage_router;
pub use health::create_router as health_router;
pub use report::create_router as report_router;
pub use station::create_router as station_router;

// ============================================================================
// OPENAPI DOCUMENT
// ============================================================================

/// Serve the OpenAPI specification as JSON.
async fn openapi_json() -> impl IntoResponse {
    use utoipa::OpenApi;
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS
// ============================================================================

/// Build the CORS layer from configuration.
///
/// With no configured origins the layer is permissive, which suits local
/// development and field deployments behind a trusted proxy. Configured
/// origins produce an explicit allowlist.
pub fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins (no allowlist configured)");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            origins = ?config.cors_origins,
            "CORS: restricting to configured origins"
        );
        let origins: Vec<axum::http::HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("ESCRUTA_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

// ============================================================================
// ROUTER ASSEMBLY
// ============================================================================

/// Create the complete API router.
///
/// Every route under `/api/v1` requires a bearer token except the OpenAPI
/// document. `/health` is unauthenticated so load balancers can probe it.
///
/// In production (`ESCRUTA_ENVIRONMENT=production`) an explicit CORS origin
/// allowlist is required.
pub fn create_api_router(
    store: Arc<dyn ReportStore>,
    directory: Arc<dyn TableDirectory>,
    registry: Arc<dyn AssignmentRegistry>,
    identities: Arc<dyn IdentityProvider>,
    ws: Arc<WsState>,
    config: &ApiConfig,
) -> ApiResult<Router> {
    if is_production_environment() && config.cors_origins.is_empty() {
        return Err(ApiError::internal_error(
            "CORS origins not configured for production. Set ESCRUTA_CORS_ORIGINS.",
        ));
    }

    let auth_state = AuthState::new(identities);

    let engine = AggregationEngine::new(store.clone(), directory.clone());
    let analyzer = CoverageAnalyzer::new(
        store.clone(),
        directory,
        registry.clone(),
        CoverageConfig::default(),
    );

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(ws.clone());

    // Routes added after the auth layer stay public; only the OpenAPI
    // document belongs there.
    let api_routes = Router::new()
        .nest("/reports", report::create_router(store.clone(), registry, ws))
        .nest("/stations", station::create_router(store.clone()))
        .nest("/aggregates", aggregate::create_router(engine))
        .nest("/coverage", coverage::create_router(analyzer))
        .merge(ws_routes)
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .route("/openapi.json", get(openapi_json));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router(store));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router.merge(
            SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()),
        )
    };

    Ok(router
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use escruta_engine::{StaticDirectory, StaticIdentityProvider, StaticRegistry};
    use escruta_storage::InMemoryReportStore;

    fn test_config() -> ApiConfig {
        ApiConfig::default()
    }

    #[test]
    fn cors_layer_builds_without_origins() {
        let config = test_config();
        let _layer = build_cors_layer(&config);
    }

    #[test]
    fn cors_layer_builds_with_origins() {
        let config = ApiConfig {
            cors_origins: vec![
                "https://escruta.example.org".to_string(),
                "https://app.escruta.example.org".to_string(),
            ],
            ..ApiConfig::default()
        };
        let _layer = build_cors_layer(&config);
    }

    #[test]
    fn router_assembles_with_in_memory_providers() {
        let store: Arc<dyn ReportStore> = Arc::new(InMemoryReportStore::new());
        let directory = Arc::new(StaticDirectory::new());
        let registry = Arc::new(StaticRegistry::new());
        let identities = Arc::new(StaticIdentityProvider::new());
        let ws = Arc::new(WsState::new(16));

        let router = create_api_router(
            store,
            directory,
            registry,
            identities,
            ws,
            &test_config(),
        );
        assert!(router.is_ok());
    }

    #[test]
    fn production_requires_cors_allowlist() {
        let store: Arc<dyn ReportStore> = Arc::new(InMemoryReportStore::new());
        let directory = Arc::new(StaticDirectory::new());
        let registry = Arc::new(StaticRegistry::new());
        let identities = Arc::new(StaticIdentityProvider::new());
        let ws = Arc::new(WsState::new(16));

        std::env::set_var("ESCRUTA_ENVIRONMENT", "production");
        let result = create_api_router(
            store,
            directory,
            registry,
            identities,
            ws,
            &test_config(),
        );
        std::env::remove_var("ESCRUTA_ENVIRONMENT");

        assert!(result.is_err());
    }
}
