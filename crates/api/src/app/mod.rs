//! HTTP application wiring (Axum router + middleware order).
//!
//! - `state.rs`: shared handler state built from `Config`
//! - `routes/`: HTTP handlers, one file per area
//! - `errors.rs`: authentication failures and JSON error bodies

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    let auth = state.auth.clone();
    let env = state.env;

    let jobs = Router::new()
        .route("/jobs", get(routes::pages::jobs))
        .layer(from_fn_with_state(auth.clone(), middleware::inject_auth_token));

    let profile = Router::new()
        .route("/profile/home", get(routes::profile::home))
        .layer(from_fn_with_state(auth.clone(), middleware::user_auth_page));

    let api = Router::new()
        .route("/api/v1/me", get(routes::profile::me))
        .layer(from_fn_with_state(auth.clone(), middleware::user_auth));

    let admin = routes::admin::router().layer(from_fn_with_state(auth.clone(), middleware::admin_auth));

    let machine = routes::machine::router().layer(from_fn_with_state(auth, middleware::machine_auth));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/", get(routes::pages::home))
        .route("/auth", get(routes::pages::auth))
        .route("/autologin", get(routes::pages::autologin))
        .route("/x/auth/link/:token", get(routes::sign_on::link))
        .route("/x/auth/session", post(routes::sign_on::session))
        .route("/x/auth/logout", get(routes::sign_on::logout))
        .merge(jobs)
        .merge(profile)
        .merge(api)
        .merge(admin)
        .merge(machine)
        .with_state(state)
        // Outermost first: logging, https, headers, gzip.
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::request_logging))
                .layer(from_fn_with_state(env, middleware::https_redirect))
                .layer(from_fn_with_state(env, middleware::security_headers))
                .layer(CompressionLayer::new().gzip(true)),
        )
}
