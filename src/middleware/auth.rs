use async_trait::async_trait;
use axum::{
    extract::{Query, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;

/// Identity established from a verified bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

/// Validates a bearer token with the identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

pub type SharedVerifier = Arc<dyn TokenVerifier>;

/// Gate: a valid `Authorization: Bearer <token>` header.
///
/// On success the caller's [`VerifiedIdentity`] is stored in the request
/// extensions for the gates and handlers that follow.
pub async fn require_auth(
    State(verifier): State<SharedVerifier>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);

    let Some(token) = token else {
        return ApiError::Unauthorized.into_response();
    };

    match verifier.verify(&token).await {
        Ok(identity) => {
            tracing::debug!("Authenticated {}", identity.uid);
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(AuthError::KeysUnavailable(reason)) => {
            tracing::error!("Token verification unavailable: {}", reason);
            ApiError::Unauthorized.into_response()
        }
        Err(e) => {
            tracing::warn!("Rejected bearer token: {}", e);
            ApiError::Unauthorized.into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmailParam {
    email: Option<String>,
}

/// Gate: the verified email must equal the `?email=` query parameter exactly.
/// Runs after [`require_auth`]; a request without an identity is refused.
pub async fn require_email_match(request: Request, next: Next) -> Response {
    let claimed = Query::<EmailParam>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(param)| param.email);
    let Some(identity) = request.extensions().get::<VerifiedIdentity>() else {
        return ApiError::Unauthorized.into_response();
    };

    let matched = matches!(
        (identity.email.as_deref(), claimed.as_deref()),
        (Some(verified), Some(claimed)) if verified == claimed
    );

    if matched {
        next.run(request).await
    } else {
        ApiError::Forbidden.into_response()
    }
}

/// Token part of a `Bearer <token>` header value, if non-empty
fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .and_then(|rest| rest.split(' ').next())
        .filter(|token| !token.is_empty())
}

/// Fixed token-to-email table standing in for the identity provider in tests
#[cfg(test)]
pub struct StaticVerifier(pub std::collections::HashMap<String, String>);

#[cfg(test)]
impl StaticVerifier {
    pub fn shared(entries: &[(&str, &str)]) -> SharedVerifier {
        Arc::new(Self(
            entries
                .iter()
                .map(|(token, email)| (token.to_string(), email.to_string()))
                .collect(),
        ))
    }
}

#[cfg(test)]
#[async_trait]
impl TokenVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        self.0
            .get(token)
            .map(|email| VerifiedIdentity {
                uid: format!("uid-{token}"),
                email: Some(email.clone()),
            })
            .ok_or_else(|| AuthError::Rejected("unknown token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    struct BrokenVerifier;

    #[async_trait]
    impl TokenVerifier for BrokenVerifier {
        async fn verify(&self, _token: &str) -> Result<VerifiedIdentity, AuthError> {
            Err(AuthError::KeysUnavailable("connection refused".to_string()))
        }
    }

    fn setup_test_app(verifier: SharedVerifier) -> Router {
        let protected = Router::new()
            .route(
                "/protected",
                get(|Extension(identity): Extension<VerifiedIdentity>| async move {
                    identity.email.unwrap_or_default()
                }),
            )
            .route_layer(middleware::from_fn_with_state(verifier.clone(), require_auth));

        let owner = Router::new()
            .route("/mine", get(|| async { "ok" }))
            .route_layer(middleware::from_fn(require_email_match))
            .route_layer(middleware::from_fn_with_state(verifier, require_auth));

        Router::new()
            .route("/open", get(|| async { "open" }))
            .merge(protected)
            .merge(owner)
    }

    fn test_app() -> Router {
        setup_test_app(StaticVerifier::shared(&[("test-token-123", "a@x.com")]))
    }

    async fn send(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn test_open_route_no_auth_required() {
        let (status, _) = send(test_app(), "/open", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_missing_auth() {
        let (status, body) = send(test_app(), "/protected", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"message":"unauthorized access"}"#);
    }

    #[tokio::test]
    async fn test_protected_wrong_scheme() {
        let (status, _) = send(test_app(), "/protected", Some("Token test-token-123")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_invalid_token() {
        let (status, body) = send(test_app(), "/protected", Some("Bearer wrong-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"message":"unauthorized access"}"#);
    }

    #[tokio::test]
    async fn test_protected_verifier_unavailable() {
        let app = setup_test_app(Arc::new(BrokenVerifier));
        let (status, _) = send(app, "/protected", Some("Bearer test-token-123")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_valid_token_attaches_identity() {
        let (status, body) = send(test_app(), "/protected", Some("Bearer test-token-123")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a@x.com");
    }

    #[tokio::test]
    async fn test_email_match() {
        let (status, _) =
            send(test_app(), "/mine?email=a@x.com", Some("Bearer test-token-123")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_email_mismatch_forbidden() {
        let (status, body) =
            send(test_app(), "/mine?email=b@y.com", Some("Bearer test-token-123")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, r#"{"message":"forbidden access"}"#);
    }

    #[tokio::test]
    async fn test_email_match_is_case_sensitive() {
        let (status, _) =
            send(test_app(), "/mine?email=A@X.COM", Some("Bearer test-token-123")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_email_missing_forbidden() {
        let (status, _) = send(test_app(), "/mine", Some("Bearer test-token-123")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_email_gate_runs_after_auth() {
        let (status, _) = send(test_app(), "/mine?email=a@x.com", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
