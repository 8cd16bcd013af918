//! Gateway Transport
//!
//! The seam the sync coordinator delivers queued submissions through.
//! `HttpGatewayTransport` speaks the REST wire format; tests substitute
//! scripted implementations. Failures split into transient (server
//! unreachable or 5xx, worth retrying) and rejected (a server verdict,
//! never retried).

use async_trait::async_trait;
use escruta_api::{ApiError, ErrorCode, SubmitReportRequest};
use escruta_core::{ReportSubmission, SyncConfig, TableReport};
use std::time::Duration;

// ============================================================================
// TRANSPORT CONTRACT
// ============================================================================

/// Failure of one delivery attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The server never rendered a verdict; the item stays queued.
    #[error("Transient delivery failure: {reason}")]
    Transient { reason: String },
    /// The server understood the request and said no.
    #[error("Rejected by server: {code}: {message}")]
    Rejected { code: ErrorCode, message: String },
}

impl TransportError {
    /// True when the server already holds a different report for the table.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            TransportError::Rejected {
                code: ErrorCode::AlreadyReported,
                ..
            }
        )
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    /// Stored report as the server returned it.
    pub report: TableReport,
    /// False when the server already held the identical payload.
    pub newly_recorded: bool,
}

/// Delivers one submission to the results gateway.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn submit(&self, submission: &ReportSubmission)
        -> Result<SubmitReceipt, TransportError>;
}

// ============================================================================
// HTTP TRANSPORT
// ============================================================================

/// REST transport for the ESCRUTA API.
pub struct HttpGatewayTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpGatewayTransport {
    /// Build a transport for the given server. The request timeout comes
    /// from the sync policy so one hung request cannot stall a pass.
    pub fn new(
        base_url: &str,
        auth_token: &str,
        sync: &SyncConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(sync.submit_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
        })
    }

    fn reports_url(&self) -> String {
        format!("{}/api/v1/reports", self.base_url)
    }
}

fn request_body(submission: &ReportSubmission) -> SubmitReportRequest {
    SubmitReportRequest {
        station_id: submission.station_id,
        table_number: submission.table_number,
        votes_registered: submission.tally.votes_registered,
        votes_candidate: submission.tally.votes_candidate,
        votes_blank: submission.tally.votes_blank,
        votes_null: submission.tally.votes_null,
        has_irregularities: submission.has_irregularities,
        irregularity_type: submission.irregularity_type,
        irregularity_details: submission.irregularity_details.clone(),
        observations: submission.observations.clone(),
    }
}

/// HTTP status to error code when the body carries no structured error.
fn fallback_code(status: reqwest::StatusCode) -> ErrorCode {
    match status.as_u16() {
        401 => ErrorCode::Unauthorized,
        403 => ErrorCode::Forbidden,
        404 => ErrorCode::ReportNotFound,
        409 => ErrorCode::AlreadyReported,
        _ => ErrorCode::ValidationFailed,
    }
}

#[async_trait]
impl GatewayTransport for HttpGatewayTransport {
    async fn submit(
        &self,
        submission: &ReportSubmission,
    ) -> Result<SubmitReceipt, TransportError> {
        let response = self
            .client
            .post(self.reports_url())
            .bearer_auth(&self.auth_token)
            .json(&request_body(submission))
            .send()
            .await
            .map_err(|e| TransportError::Transient {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            // 201 for a fresh record, 200 for an idempotent replay.
            let report =
                response
                    .json::<TableReport>()
                    .await
                    .map_err(|e| TransportError::Transient {
                        reason: format!("Malformed server response: {e}"),
                    })?;
            return Ok(SubmitReceipt {
                report,
                newly_recorded: status == reqwest::StatusCode::CREATED,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Transient {
                reason: e.to_string(),
            })?;
        match serde_json::from_str::<ApiError>(&text) {
            Ok(api_error) if api_error.code.is_retryable() => Err(TransportError::Transient {
                reason: format!("{}: {}", api_error.code, api_error.message),
            }),
            Ok(api_error) => Err(TransportError::Rejected {
                code: api_error.code,
                message: api_error.message,
            }),
            Err(_) if status.is_server_error() => Err(TransportError::Transient {
                reason: format!("HTTP {}: {}", status.as_u16(), text),
            }),
            Err(_) => Err(TransportError::Rejected {
                code: fallback_code(status),
                message: format!("HTTP {}: {}", status.as_u16(), text),
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use escruta_core::{EntityIdType, StationId, VoteTally};

    fn submission() -> ReportSubmission {
        ReportSubmission {
            station_id: StationId::now_v7(),
            table_number: 4,
            tally: VoteTally {
                votes_registered: 300,
                votes_candidate: 140,
                votes_blank: 10,
                votes_null: 5,
            },
            has_irregularities: true,
            irregularity_type: Some(escruta_core::IrregularityType::CountMismatch),
            irregularity_details: Some("El acta no coincide con el conteo".to_string()),
            observations: None,
        }
    }

    #[test]
    fn request_body_carries_every_field() {
        let submission = submission();
        let body = request_body(&submission);
        assert_eq!(body.station_id, submission.station_id);
        assert_eq!(body.table_number, 4);
        assert_eq!(body.votes_registered, 300);
        assert_eq!(body.votes_candidate, 140);
        assert_eq!(body.votes_blank, 10);
        assert_eq!(body.votes_null, 5);
        assert!(body.has_irregularities);
        assert_eq!(
            body.irregularity_type,
            Some(escruta_core::IrregularityType::CountMismatch)
        );
        assert_eq!(
            body.irregularity_details.as_deref(),
            Some("El acta no coincide con el conteo")
        );
        assert!(body.observations.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let transport = HttpGatewayTransport::new(
            "http://localhost:3000/",
            "witness-token",
            &SyncConfig::default(),
        )
        .unwrap();
        assert_eq!(
            transport.reports_url(),
            "http://localhost:3000/api/v1/reports"
        );
    }

    #[test]
    fn unstructured_statuses_map_to_codes() {
        assert_eq!(
            fallback_code(reqwest::StatusCode::UNAUTHORIZED),
            ErrorCode::Unauthorized
        );
        assert_eq!(
            fallback_code(reqwest::StatusCode::CONFLICT),
            ErrorCode::AlreadyReported
        );
        assert_eq!(
            fallback_code(reqwest::StatusCode::NOT_FOUND),
            ErrorCode::ReportNotFound
        );
        assert_eq!(
            fallback_code(reqwest::StatusCode::UNPROCESSABLE_ENTITY),
            ErrorCode::ValidationFailed
        );
    }

    #[test]
    fn only_divergent_conflicts_are_conflicts() {
        let conflict = TransportError::Rejected {
            code: ErrorCode::AlreadyReported,
            message: "divergent".to_string(),
        };
        let rejection = TransportError::Rejected {
            code: ErrorCode::NotAssigned,
            message: "not yours".to_string(),
        };
        let outage = TransportError::Transient {
            reason: "connection refused".to_string(),
        };
        assert!(conflict.is_conflict());
        assert!(!rejection.is_conflict());
        assert!(!outage.is_conflict());
    }
}
