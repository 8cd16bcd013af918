//! Station REST API Routes
//!
//! Read-side listing of every report recorded for one polling station.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    types::ListReportsResponse,
};
use escruta_core::{EntityIdType, StationId};
use escruta_storage::ReportStore;

/// Shared application state for station routes.
pub struct StationState {
    pub store: Arc<dyn ReportStore>,
}

/// GET /api/v1/stations/{station_id}/reports - List a station's reports
#[utoipa::path(
    get,
    path = "/api/v1/stations/{station_id}/reports",
    tag = "Stations",
    params(
        ("station_id" = Uuid, Path, description = "Polling station ID")
    ),
    responses(
        (status = 200, description = "Reports ordered by table number", body = ListReportsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_station_reports(
    State(state): State<Arc<StationState>>,
    Path(station_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    // An unknown station simply has no reports; the empty list is the answer.
    let reports = state
        .store
        .report_list_by_station(StationId::new(station_id))?;
    let total = reports.len() as i32;

    Ok(Json(ListReportsResponse { reports, total }))
}

/// Create the station routes router.
pub fn create_router(store: Arc<dyn ReportStore>) -> axum::Router {
    let state = Arc::new(StationState { store });

    axum::Router::new()
        .route("/:station_id/reports", axum::routing::get(list_station_reports))
        .with_state(state)
}
