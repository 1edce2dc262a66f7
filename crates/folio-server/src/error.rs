//! Error types for the HTTP server.
//!
//! Every error renders as `{"status": "error", "message": "<code>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use folio_tree::{TreeError, TreeErrorKind};
use serde_json::json;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    /// No `Authorization` header.
    #[error("missing bearer token")]
    Unauthorized,

    /// Token not accepted by the authenticator.
    #[error("invalid bearer token")]
    InvalidToken,

    /// Malformed request body or query.
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Tree operation failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, String) {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token".to_owned()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request".to_owned()),
            Self::Tree(e) => {
                let status = match e.kind() {
                    TreeErrorKind::NotFound => StatusCode::NOT_FOUND,
                    TreeErrorKind::InvalidStructure => StatusCode::BAD_REQUEST,
                    _ => StatusCode::CONFLICT,
                };
                (status, e.code())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status == StatusCode::CONFLICT {
            tracing::warn!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, axum::Json(json!({"status": "error", "message": code}))).into_response()
    }
}
