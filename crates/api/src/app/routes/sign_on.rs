//! Getting a token into the session, and out again.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use jobboard_auth::UserClaims;
use jobboard_infra::RepositoryError;

use crate::app::{AppState, errors};
use crate::session::{JWT_KEY, set_cookie_value};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub id_token: String,
}

/// GET /x/auth/link/:token - the link mailed to users on sign-on
pub async fn link(State(state): State<AppState>, headers: HeaderMap, Path(token): Path<String>) -> Response {
    let (user, existed) = match state.users.get_or_create_user_from_token(&token).await {
        Ok(found) => found,
        Err(RepositoryError::TokenNotFound) => {
            return state
                .templates
                .render(
                    StatusCode::UNAUTHORIZED,
                    "auth.html",
                    json!({ "error": "This sign-on link is invalid or has expired." }),
                )
                .into_response();
        }
        Err(err) => return errors::repository_error_to_response(err),
    };
    info!(user_id = %user.id, user_type = %user.user_type, existed, "sign-on link resolved");

    let claims = UserClaims::for_user(&user, Utc::now(), state.jwt_ttl);
    let jwt = match state.signer.sign(&claims) {
        Ok(jwt) => jwt,
        Err(err) => {
            error!(error = %err, "failed to sign session jwt");
            return errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "sign_error", "internal error");
        }
    };

    let mut session = state.auth.sessions.load(&headers).unwrap_or_default();
    session.insert(JWT_KEY, jwt);
    let cookie = state.auth.sessions.save(&session);

    let target = if user.is_admin() { "/admin" } else { "/" };
    ([(SET_COOKIE, set_cookie_value(&cookie))], Redirect::to(target)).into_response()
}

/// POST /x/auth/session - store a freshly issued provider ID token in the session
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SessionRequest>,
) -> Response {
    let token = match state.auth.id_tokens.verify(&body.id_token).await {
        Ok(token) => token,
        Err(err) => return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string()),
    };
    info!(uid = %token.uid, "provider session established");

    let mut session = state.auth.sessions.load(&headers).unwrap_or_default();
    session.insert(JWT_KEY, body.id_token);
    let cookie = state.auth.sessions.save(&session);

    (StatusCode::NO_CONTENT, [(SET_COOKIE, set_cookie_value(&cookie))]).into_response()
}

/// GET /x/auth/logout
pub async fn logout(State(state): State<AppState>) -> Response {
    let cleared = state.auth.sessions.clear();
    ([(SET_COOKIE, set_cookie_value(&cleared))], Redirect::to("/")).into_response()
}
