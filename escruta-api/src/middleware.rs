//! Axum Middleware for Authentication
//!
//! Resolves the bearer token on every protected request through the
//! configured identity provider and injects the resulting `CallerIdentity`
//! into request extensions. Capability checks happen downstream: the report
//! handlers require submit, the validation ledger requires validate.
//!
//! Returns 401 for missing, malformed, or unknown tokens.

use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use escruta_core::{CallerIdentity, IdentityProvider};
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
///
/// Passed to the middleware via Axum's State extractor.
#[derive(Clone)]
pub struct AuthState {
    /// Token-to-identity resolver
    pub identities: Arc<dyn IdentityProvider>,
}

impl AuthState {
    pub fn new(identities: Arc<dyn IdentityProvider>) -> Self {
        Self { identities }
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for authentication.
///
/// 1. Extracts the `Authorization: Bearer <token>` header
/// 2. Resolves the token through the identity provider
/// 3. Returns 401 Unauthorized when resolution fails
/// 4. Injects `CallerIdentity` into request extensions on success
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use escruta_api::middleware::{auth_middleware, AuthState};
///
/// let auth_state = AuthState::new(identities);
/// let app = Router::new()
///     .route("/api/v1/reports", axum::routing::post(|| async { "OK" }))
///     .layer(middleware::from_fn_with_state(auth_state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(value) => value.strip_prefix("Bearer ").ok_or_else(|| {
            AuthMiddlewareError(ApiError::unauthorized(
                "Authorization header must use Bearer scheme",
            ))
        })?,
        None => {
            return Err(AuthMiddlewareError(ApiError::unauthorized(
                "Authentication required: provide Authorization: Bearer <token>",
            )));
        }
    };

    let caller = state.identities.authenticate(token).ok_or_else(|| {
        warn!("bearer token rejected");
        AuthMiddlewareError(ApiError::unauthorized("Unknown or revoked token"))
    })?;

    debug!(
        reporter = %caller.reporter_id,
        name = %caller.display_name,
        "request authenticated"
    );

    // Inject CallerIdentity into request extensions
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
///
/// Lets the middleware return errors that convert to HTTP responses with
/// the status derived from the error code.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed Axum extractor for the authenticated caller.
///
/// Implements `FromRequestParts`, so handlers can require the caller in
/// their signatures and get a compile-time guarantee that authentication
/// ran before them.
///
/// # Example
///
/// ```ignore
/// use escruta_api::middleware::CallerExtractor;
///
/// async fn whoami(CallerExtractor(caller): CallerExtractor) -> String {
///     caller.display_name
/// }
/// ```
///
/// The `auth_middleware` must be applied to the route for this extractor to
/// work; without it the extractor returns 500 Internal Server Error.
#[derive(Debug, Clone)]
pub struct CallerExtractor(pub CallerIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Injected by auth_middleware
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(CallerExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "Caller identity not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for CallerExtractor {
    type Target = CallerIdentity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use escruta_core::{CapabilitySet, EntityIdType, ReporterId};
    use escruta_engine::StaticIdentityProvider;
    use tower::ServiceExt; // for `oneshot`

    fn test_identities() -> StaticIdentityProvider {
        let mut identities = StaticIdentityProvider::new();
        identities.register(
            "witness_token_123",
            CallerIdentity::new(
                ReporterId::now_v7(),
                "Laura Restrepo",
                CapabilitySet::witness(),
            ),
        );
        identities
    }

    fn test_app() -> Router {
        let auth_state = AuthState::new(Arc::new(test_identities()));

        Router::new()
            .route("/protected", get(|| async { "Protected resource" }))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
    }

    #[tokio::test]
    async fn test_middleware_with_valid_token() {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer witness_token_123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_with_unknown_token() {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_without_authentication() {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_middleware_with_malformed_auth_header() {
        let app = test_app();

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "NotBearer token")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_caller_extractor_with_valid_auth() {
        let auth_state = AuthState::new(Arc::new(test_identities()));

        async fn handler(CallerExtractor(caller): CallerExtractor) -> String {
            format!(
                "Reporter: {}, submits: {}",
                caller.display_name,
                caller.capabilities.can_submit()
            )
        }

        let app = Router::new()
            .route("/protected", get(handler))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer witness_token_123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();
        assert!(body_str.contains("Laura Restrepo"));
        assert!(body_str.contains("submits: true"));
    }

    #[tokio::test]
    async fn test_caller_extractor_without_middleware() {
        async fn handler(CallerExtractor(_caller): CallerExtractor) -> String {
            "Should not reach here".to_string()
        }

        // Router WITHOUT auth middleware
        let app = Router::new().route("/unprotected", get(handler));

        let request = Request::builder()
            .uri("/unprotected")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_caller_extractor_deref() {
        let auth_state = AuthState::new(Arc::new(test_identities()));

        // Deref gives direct access to CallerIdentity fields
        async fn handler(caller: CallerExtractor) -> String {
            if caller.capabilities.can_validate() {
                "supervisor".to_string()
            } else {
                "witness".to_string()
            }
        }

        let app = Router::new()
            .route("/protected", get(handler))
            .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", "Bearer witness_token_123")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), "witness");
    }
}
