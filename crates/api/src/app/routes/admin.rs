//! Admin routes for account management.
//!
//! Every route sits behind `admin_auth`, which attaches the caller's
//! `UserClaims`.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use jobboard_auth::UserClaims;
use jobboard_core::UserId;

use crate::app::{AppState, errors};

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(page))
        .route("/admin/users", axum::routing::delete(delete_user))
        .route("/admin/users/type", get(user_type))
        .route("/admin/users/:id", get(get_user))
}

/// GET /admin - dashboard placeholder
pub async fn page(State(state): State<AppState>, Extension(claims): Extension<UserClaims>) -> Response {
    state
        .templates
        .render(StatusCode::OK, "admin.html", json!({ "signed_in": true, "email": claims.email }))
        .into_response()
}

/// GET /admin/users/:id
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id: UserId = match id.parse() {
        Ok(id) => id,
        Err(err) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{err}"));
        }
    };

    match state.users.get_user(id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
        Err(err) => errors::repository_error_to_response(err),
    }
}

/// DELETE /admin/users?email= - hard delete, the only way accounts go away
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Query(q): Query<EmailQuery>,
) -> Response {
    match state.users.delete_user_by_email(&q.email).await {
        Ok(deleted) => {
            info!(admin = %claims.user_id, deleted, "deleted user by email");
            Json(json!({ "deleted": deleted })).into_response()
        }
        Err(err) => errors::repository_error_to_response(err),
    }
}

/// GET /admin/users/type?email=
pub async fn user_type(State(state): State<AppState>, Query(q): Query<EmailQuery>) -> Response {
    match state.users.get_user_type_by_email(&q.email).await {
        Ok(Some(user_type)) => Json(json!({ "email": q.email, "user_type": user_type })).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no account or profile for email"),
        Err(err) => errors::repository_error_to_response(err),
    }
}
