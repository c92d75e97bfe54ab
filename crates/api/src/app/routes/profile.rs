//! End-user area, authenticated by the identity provider's ID token.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::Html,
};
use serde_json::json;

use jobboard_auth::IdToken;
use jobboard_templates::TemplateError;

use crate::app::AppState;

/// GET /profile/home
pub async fn home(
    State(state): State<AppState>,
    Extension(token): Extension<IdToken>,
) -> Result<(StatusCode, Html<String>), TemplateError> {
    state.templates.render(
        StatusCode::OK,
        "profile-home.html",
        json!({
            "signed_in": true,
            "uid": token.uid,
            "email": token.email,
            "email_verified": token.email_verified,
        }),
    )
}

/// GET /api/v1/me
pub async fn me(Extension(token): Extension<IdToken>) -> Json<IdToken> {
    Json(token)
}
