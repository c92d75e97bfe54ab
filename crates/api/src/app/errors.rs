use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use jobboard_infra::RepositoryError;

/// Why a request could not be authenticated from its session cookie.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A session cookie came in but failed signature or decoding.
    #[error("no authentication session")]
    NoAuthSession,

    /// The session carries no token.
    #[error("no authentication cookie")]
    NoAuthCookie,

    #[error("token verification failed")]
    TokenVerificationFailed,
}

pub fn repository_error_to_response(err: RepositoryError) -> axum::response::Response {
    match err {
        RepositoryError::TokenNotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        RepositoryError::Conflict { .. } => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        RepositoryError::Database { .. } | RepositoryError::Corrupt { .. } | RepositoryError::Storage(_) => {
            error!(error = %err, "repository call failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "internal error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
