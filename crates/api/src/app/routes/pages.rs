//! Public pages.

use axum::{
    Extension,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;

use jobboard_auth::IdToken;
use jobboard_templates::TemplateError;

use crate::app::AppState;
use crate::middleware::{is_signed_on, user_from_jwt};

const DEFAULT_DIRECT_TO: &str = "/profile/home";

#[derive(Debug, Deserialize)]
pub struct AutologinParams {
    pub directto: Option<String>,
}

/// GET / - landing page, aware of a sign-on session
pub async fn home(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Html<String>), TemplateError> {
    let claims = user_from_jwt(&state.auth, &headers).ok();
    state.templates.render(
        StatusCode::OK,
        "home.html",
        json!({
            "signed_in": claims.is_some(),
            "email": claims.as_ref().map(|c| c.email.as_str()),
            "is_admin": claims.as_ref().is_some_and(|c| c.is_admin),
        }),
    )
}

/// GET /auth - sign-in page; signed-in visitors go home
pub async fn auth(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if is_signed_on(&state.auth, &headers) {
        return Redirect::to("/").into_response();
    }
    state
        .templates
        .render(StatusCode::OK, "auth.html", json!({}))
        .into_response()
}

/// GET /autologin?directto= - re-authenticates with the provider client-side, then continues
pub async fn autologin(
    State(state): State<AppState>,
    Query(params): Query<AutologinParams>,
) -> Result<(StatusCode, Html<String>), TemplateError> {
    let direct_to = params
        .directto
        .filter(|p| p.starts_with('/') && !p.starts_with("//"))
        .unwrap_or_else(|| DEFAULT_DIRECT_TO.to_string());
    state
        .templates
        .render(StatusCode::OK, "autologin.html", json!({ "direct_to": direct_to }))
}

/// GET /jobs - job listing, personalised when a provider identity is attached
pub async fn jobs(
    State(state): State<AppState>,
    token: Option<Extension<IdToken>>,
) -> Result<(StatusCode, Html<String>), TemplateError> {
    let signed_in = token.is_some();
    let email = token.and_then(|Extension(t)| t.email);
    state.templates.render(
        StatusCode::OK,
        "jobs.html",
        json!({
            "signed_in": signed_in,
            "email": email,
        }),
    )
}
