//! Service-to-service endpoints (cron jobs, the mailer), behind `machine_auth`.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use jobboard_core::UserType;

use crate::app::{AppState, errors};

const SIGN_ON_TOKEN_LEN: usize = 48;

#[derive(Debug, Deserialize)]
pub struct IssueTokenRequest {
    pub email: String,
    pub user_type: UserType,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/machine/sign-on-tokens", post(issue_sign_on_token))
        .route("/machine/sign-on-tokens/purge", post(purge_sign_on_tokens))
}

/// POST /machine/sign-on-tokens - mint a token for a sign-on link
pub async fn issue_sign_on_token(State(state): State<AppState>, Json(body): Json<IssueTokenRequest>) -> Response {
    if !body.email.contains('@') {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "email is not valid");
    }

    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SIGN_ON_TOKEN_LEN)
        .map(char::from)
        .collect();

    match state.users.save_token_sign_on(&body.email, &token, body.user_type).await {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "token": token }))).into_response(),
        Err(err) => errors::repository_error_to_response(err),
    }
}

/// POST /machine/sign-on-tokens/purge
pub async fn purge_sign_on_tokens(State(state): State<AppState>) -> Response {
    match state.users.delete_expired_sign_on_tokens().await {
        Ok(deleted) => {
            info!(deleted, "purged expired sign-on tokens on request");
            Json(json!({ "deleted": deleted })).into_response()
        }
        Err(err) => errors::repository_error_to_response(err),
    }
}
