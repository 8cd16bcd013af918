//! Aggregate REST API Routes
//!
//! Rollup queries over the report log. The scope comes from query
//! parameters; with none the handler answers for the whole election.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    types::{AggregateQuery, AggregateResponse},
};
use escruta_core::AggregateScope;
use escruta_engine::AggregationEngine;

/// Shared application state for aggregate routes.
pub struct AggregateState {
    pub engine: AggregationEngine,
}

/// GET /api/v1/aggregates - Rollup for one scope
#[utoipa::path(
    get,
    path = "/api/v1/aggregates",
    tag = "Aggregates",
    params(
        ("municipality_id" = Option<String>, Query, description = "Municipality scope"),
        ("station_id" = Option<String>, Query, description = "Station scope (overrides municipality)"),
        ("table_number" = Option<i32>, Query, description = "Single-table scope; requires station_id"),
    ),
    responses(
        (status = 200, description = "Rollup with derived figures", body = AggregateResponse),
        (status = 400, description = "Malformed or unknown scope id", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_aggregates(
    State(state): State<Arc<AggregateState>>,
    Query(params): Query<AggregateQuery>,
) -> ApiResult<impl IntoResponse> {
    let scope = resolve_scope(&params)?;
    let snapshot = state.engine.aggregate(scope)?;

    Ok(Json(AggregateResponse::from(snapshot)))
}

/// Narrowest requested scope wins: table over station over municipality.
fn resolve_scope(params: &AggregateQuery) -> ApiResult<AggregateScope> {
    if let Some(table_number) = params.table_number {
        let station = params.station_id.as_deref().ok_or_else(|| {
            ApiError::validation_failed("table_number requires station_id")
        })?;
        return Ok(AggregateScope::Table {
            station_id: station.parse()?,
            table_number,
        });
    }

    if let Some(station) = params.station_id.as_deref() {
        return Ok(AggregateScope::Station {
            station_id: station.parse()?,
        });
    }

    if let Some(municipality) = params.municipality_id.as_deref() {
        return Ok(AggregateScope::Municipality {
            municipality_id: municipality.parse()?,
        });
    }

    Ok(AggregateScope::Global)
}

/// Create the aggregate routes router.
pub fn create_router(engine: AggregationEngine) -> axum::Router {
    let state = Arc::new(AggregateState { engine });

    axum::Router::new()
        .route("/", axum::routing::get(get_aggregates))
        .with_state(state)
}
