//! Coverage REST API Routes
//!
//! Serves the ranked witness-coverage picture for campaign coordinators:
//! which tables carry the most weight, which big tables have nobody
//! assigned, and which reporters are stretched too thin.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use escruta_core::CoverageReport;
use escruta_engine::CoverageAnalyzer;

/// Shared application state for coverage routes.
pub struct CoverageState {
    pub analyzer: CoverageAnalyzer,
}

/// GET /api/v1/coverage - Full coverage report
#[utoipa::path(
    get,
    path = "/api/v1/coverage",
    tag = "Coverage",
    responses(
        (status = 200, description = "Ranked coverage picture", body = CoverageReport),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_coverage(
    State(state): State<Arc<CoverageState>>,
) -> ApiResult<impl IntoResponse> {
    let report = state.analyzer.analyze()?;

    Ok(Json(report))
}

/// Create the coverage routes router.
pub fn create_router(analyzer: CoverageAnalyzer) -> axum::Router {
    let state = Arc::new(CoverageState { analyzer });

    axum::Router::new()
        .route("/", axum::routing::get(get_coverage))
        .with_state(state)
}
