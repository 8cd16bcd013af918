//! API Error Handling
//!
//! Unified error envelope for all REST responses. Every failure leaves the
//! API as `{ "code": ..., "message": ..., "details": ... }` with the HTTP
//! status derived from the code, so field clients can branch on `code`
//! without parsing prose.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use escruta_core::{EngineError, GatewayError, LedgerError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODES
// ============================================================================

/// Error codes for API responses.
///
/// Serialized as SCREAMING_SNAKE_CASE strings; the offline sync loop keys its
/// terminal-vs-retryable decision off these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ErrorCode {
    /// The submission payload violates a tally invariant
    ValidationFailed,
    /// Missing or unrecognized bearer token
    Unauthorized,
    /// Authenticated but not allowed to perform this operation
    Forbidden,
    /// The reporter is not assigned to the targeted table
    NotAssigned,
    /// The caller lacks the validate capability
    SupervisorRequired,
    /// No report exists for the given report id
    ReportNotFound,
    /// The targeted table has no report yet
    NotReported,
    /// The table already has a report with a different payload
    AlreadyReported,
    /// Unexpected server-side failure
    InternalError,
    /// The report store is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// HTTP status for this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden | ErrorCode::NotAssigned | ErrorCode::SupervisorRequired => {
                StatusCode::FORBIDDEN
            }
            ErrorCode::ReportNotFound | ErrorCode::NotReported => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyReported => StatusCode::CONFLICT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Fallback message when the caller provides none.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Submission failed validation",
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Operation not permitted",
            ErrorCode::NotAssigned => "Reporter is not assigned to this table",
            ErrorCode::SupervisorRequired => "Validation requires supervisor capability",
            ErrorCode::ReportNotFound => "Report not found",
            ErrorCode::NotReported => "No report exists for this table yet",
            ErrorCode::AlreadyReported => "Table already reported with a different payload",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }

    /// Whether a client-side retry of the same payload can ever succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::InternalError | ErrorCode::ServiceUnavailable
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Error carrying the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn report_not_found(id: uuid::Uuid) -> Self {
        Self::new(ErrorCode::ReportNotFound, format!("Report not found: {}", id))
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// DOMAIN ERROR CONVERSIONS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::ReportNotFound { .. } => {
                ApiError::new(ErrorCode::ReportNotFound, err.to_string())
            }
            // Surfacing a raw duplicate here means a handler bypassed the
            // gateway; report it as a conflict anyway.
            StorageError::DuplicateReport { existing_id, .. } => {
                ApiError::new(ErrorCode::AlreadyReported, err.to_string())
                    .with_details(serde_json::json!({ "existing_report_id": existing_id }))
            }
            StorageError::LockPoisoned => {
                ApiError::new(ErrorCode::ServiceUnavailable, err.to_string())
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match &err {
            GatewayError::Validation(_) => {
                ApiError::new(ErrorCode::ValidationFailed, err.to_string())
            }
            GatewayError::NotAssigned { .. } => {
                ApiError::new(ErrorCode::NotAssigned, err.to_string())
            }
            GatewayError::AlreadyReported { existing_id, .. } => {
                ApiError::new(ErrorCode::AlreadyReported, err.to_string())
                    .with_details(serde_json::json!({ "existing_report_id": existing_id }))
            }
            GatewayError::Storage(storage) => storage.clone().into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::NotReported { .. } => {
                ApiError::new(ErrorCode::NotReported, err.to_string())
            }
            LedgerError::CapabilityDenied { .. } => {
                ApiError::new(ErrorCode::SupervisorRequired, err.to_string())
            }
            LedgerError::Storage(storage) => storage.clone().into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match &err {
            // Unknown directory ids in a query are caller mistakes, not
            // missing resources.
            EngineError::UnknownMunicipality { .. }
            | EngineError::UnknownStation { .. }
            | EngineError::UnknownTable { .. } => {
                ApiError::new(ErrorCode::ValidationFailed, err.to_string())
            }
            EngineError::Storage(storage) => storage.clone().into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::new(
            ErrorCode::ValidationFailed,
            format!("JSON serialization error: {}", err),
        )
    }
}

impl From<uuid::Error> for ApiError {
    fn from(err: uuid::Error) -> Self {
        ApiError::new(ErrorCode::ValidationFailed, format!("Invalid UUID: {}", err))
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use escruta_core::TallyError;
    use uuid::Uuid;

    #[test]
    fn error_codes_map_to_expected_statuses() {
        assert_eq!(
            ErrorCode::ValidationFailed.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotAssigned.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorCode::SupervisorRequired.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ErrorCode::ReportNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ErrorCode::NotReported.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::AlreadyReported.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn error_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::AlreadyReported).unwrap();
        assert_eq!(json, "\"ALREADY_REPORTED\"");
        let json = serde_json::to_string(&ErrorCode::SupervisorRequired).unwrap();
        assert_eq!(json, "\"SUPERVISOR_REQUIRED\"");
        let parsed: ErrorCode = serde_json::from_str("\"NOT_ASSIGNED\"").unwrap();
        assert_eq!(parsed, ErrorCode::NotAssigned);
    }

    #[test]
    fn only_server_side_failures_are_retryable() {
        assert!(ErrorCode::InternalError.is_retryable());
        assert!(ErrorCode::ServiceUnavailable.is_retryable());
        assert!(!ErrorCode::AlreadyReported.is_retryable());
        assert!(!ErrorCode::NotAssigned.is_retryable());
        assert!(!ErrorCode::ValidationFailed.is_retryable());
    }

    #[test]
    fn gateway_conflict_carries_existing_report_id() {
        let existing = Uuid::now_v7();
        let api: ApiError = GatewayError::AlreadyReported {
            station_id: Uuid::now_v7(),
            table_number: 3,
            existing_id: existing,
        }
        .into();
        assert_eq!(api.code, ErrorCode::AlreadyReported);
        let details = api.details.expect("conflict should carry details");
        assert_eq!(
            details["existing_report_id"],
            serde_json::json!(existing)
        );
    }

    #[test]
    fn tally_violation_becomes_validation_failed() {
        let api: ApiError = GatewayError::Validation(TallyError::CandidateExceedsRegistered {
            candidate: 120,
            registered: 100,
        })
        .into();
        assert_eq!(api.code, ErrorCode::ValidationFailed);
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn capability_denial_maps_to_supervisor_required() {
        let api: ApiError = LedgerError::CapabilityDenied {
            caller_id: Uuid::now_v7(),
        }
        .into();
        assert_eq!(api.code, ErrorCode::SupervisorRequired);
        assert_eq!(api.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unknown_scope_ids_map_to_validation_failed() {
        let api: ApiError = EngineError::UnknownMunicipality {
            municipality_id: Uuid::now_v7(),
        }
        .into();
        assert_eq!(api.code, ErrorCode::ValidationFailed);
    }

    #[test]
    fn details_are_omitted_from_json_when_absent() {
        let api = ApiError::from_code(ErrorCode::NotReported);
        let json = serde_json::to_string(&api).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("NOT_REPORTED"));
    }
}
