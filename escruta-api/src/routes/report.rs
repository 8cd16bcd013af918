//! Report REST API Routes
//!
//! Axum route handlers for table report submission, retrieval, and
//! supervisor validation. All writes go through the engine: the gateway
//! enforces assignment and the one-report-per-table rule, the ledger
//! enforces the validate capability.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    events::WsEvent,
    middleware::CallerExtractor,
    types::{SetValidationRequest, SubmitReportRequest},
    ws::WsState,
};
use escruta_core::{AssignmentRegistry, EntityIdType, ReportId, TableReport};
use escruta_engine::{ReportGateway, ValidationLedger};
use escruta_storage::ReportStore;

// ============================================================================
// SHARED STATE
// ============================================================================

/// Shared application state for report routes.
pub struct ReportState {
    pub gateway: ReportGateway,
    pub ledger: ValidationLedger,
    pub store: Arc<dyn ReportStore>,
    pub ws: Arc<WsState>,
}

impl ReportState {
    pub fn new(
        store: Arc<dyn ReportStore>,
        registry: Arc<dyn AssignmentRegistry>,
        ws: Arc<WsState>,
    ) -> Self {
        Self {
            gateway: ReportGateway::new(store.clone(), registry),
            ledger: ValidationLedger::new(store.clone()),
            store,
            ws,
        }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/reports - Submit one table's tally
#[utoipa::path(
    post,
    path = "/api/v1/reports",
    tag = "Reports",
    request_body = SubmitReportRequest,
    responses(
        (status = 201, description = "Report recorded", body = TableReport),
        (status = 200, description = "Identical payload already recorded", body = TableReport),
        (status = 400, description = "Tally violates an invariant", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Reporter not assigned to the table", body = ApiError),
        (status = 409, description = "Table already reported with a different payload", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn submit_report(
    State(state): State<Arc<ReportState>>,
    CallerExtractor(caller): CallerExtractor,
    Json(req): Json<SubmitReportRequest>,
) -> ApiResult<impl IntoResponse> {
    if !caller.capabilities.can_submit() {
        return Err(ApiError::forbidden("Caller lacks the submit capability"));
    }

    let submission = req.into_submission();
    let outcome = state.gateway.submit(&caller, &submission)?;
    let report = outcome.report().clone();

    if outcome.is_new() {
        state.ws.broadcast(WsEvent::ReportRecorded {
            report: report.clone(),
        });
        Ok((StatusCode::CREATED, Json(report)))
    } else {
        // Byte-identical resubmission: acknowledge without re-recording.
        Ok((StatusCode::OK, Json(report)))
    }
}

/// GET /api/v1/reports/{id} - Get report by ID
#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    tag = "Reports",
    params(
        ("id" = Uuid, Path, description = "Report ID")
    ),
    responses(
        (status = 200, description = "Report details", body = TableReport),
        (status = 404, description = "Report not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_report(
    State(state): State<Arc<ReportState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .store
        .report_get(ReportId::new(id))?
        .ok_or_else(|| ApiError::report_not_found(id))?;

    Ok(Json(report))
}

/// PUT /api/v1/reports/{id}/validation - Set or clear the validation mark
#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}/validation",
    tag = "Reports",
    params(
        ("id" = Uuid, Path, description = "Report ID")
    ),
    request_body = SetValidationRequest,
    responses(
        (status = 200, description = "Validation mark updated", body = TableReport),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Caller lacks the validate capability", body = ApiError),
        (status = 404, description = "No report exists for this id", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn set_validation(
    State(state): State<Arc<ReportState>>,
    CallerExtractor(caller): CallerExtractor,
    Path(id): Path<Uuid>,
    Json(req): Json<SetValidationRequest>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .ledger
        .set_validated(&caller, ReportId::new(id), req.is_validated)?;

    state.ws.broadcast(WsEvent::ReportValidated {
        report: report.clone(),
    });

    Ok(Json(report))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the report routes router.
pub fn create_router(
    store: Arc<dyn ReportStore>,
    registry: Arc<dyn AssignmentRegistry>,
    ws: Arc<WsState>,
) -> axum::Router {
    let state = Arc::new(ReportState::new(store, registry, ws));

    axum::Router::new()
        .route("/", axum::routing::post(submit_report))
        .route("/:id", axum::routing::get(get_report))
        .route("/:id/validation", axum::routing::put(set_validation))
        .with_state(state)
}
