use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::db::StoreError;

/// Errors returned from route handlers and auth gates
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized access")]
    Unauthorized,
    #[error("forbidden access")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidBody(rejection) => rejection.status(),
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::InvalidId(_) => "invalid_id",
            ApiError::InvalidBody(_) => "invalid_body",
            ApiError::Store(_) => "database_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            // Auth failures carry a bare message and never say why.
            ApiError::Unauthorized | ApiError::Forbidden => {
                serde_json::json!({ "message": self.to_string() })
            }
            _ => {
                if status.is_server_error() {
                    tracing::error!("Request failed: {}", self);
                }
                serde_json::json!({
                    "error": self.code(),
                    "message": self.to_string()
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
