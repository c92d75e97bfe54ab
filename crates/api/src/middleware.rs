//! Request middleware: transport policy, request logging and the three
//! authentication variants (admin, machine, end user).

use std::sync::Arc;

use axum::{
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{self, LOCATION},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use jobboard_auth::{IdToken, IdTokenVerifier, JwtValidator, UserClaims};

use crate::app::errors::{AuthError, json_error};
use crate::config::Environment;
use crate::session::{JWT_KEY, SessionStore};

type Request = axum::http::Request<axum::body::Body>;

pub const MACHINE_TOKEN_HEADER: &str = "x-machine-token";

const DEFAULT_DIRECT_TO: &str = "/profile/home";

const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (header::CONTENT_SECURITY_POLICY, "upgrade-insecure-requests"),
    (header::X_FRAME_OPTIONS, "deny"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::STRICT_TRANSPORT_SECURITY, "max-age=31536000; includeSubDomains"),
    (header::REFERRER_POLICY, "origin"),
];

#[derive(Clone)]
pub struct AuthState {
    pub sessions: SessionStore,
    pub jwt: Arc<dyn JwtValidator>,
    pub id_tokens: Arc<dyn IdTokenVerifier>,
    pub machine_token: Arc<str>,
}

/// Outside development, send plain-HTTP requests (as reported by the proxy)
/// to the same path over HTTPS.
pub async fn https_redirect(State(env): State<Environment>, req: Request, next: Next) -> Response {
    let forwarded_https = header_str(req.headers(), "x-forwarded-proto") == "https";
    if env.is_dev() || forwarded_https {
        return next.run(req).await;
    }

    let host = header_str(req.headers(), header::HOST.as_str());
    let target = format!("https://{host}{}", req.uri().path());
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, target)]).into_response()
}

pub async fn request_logging(req: Request, next: Next) -> Response {
    let headers = req.headers();
    info!(
        host = header_str(headers, header::HOST.as_str()),
        method = %req.method(),
        url = %req.uri(),
        x_forwarded_for = header_str(headers, "x-forwarded-for"),
        "req"
    );
    next.run(req).await
}

/// Outside development: turn away headless browsers and harden responses.
pub async fn security_headers(State(env): State<Environment>, req: Request, next: Next) -> Response {
    if env.is_dev() {
        return next.run(req).await;
    }
    if header_str(req.headers(), header::USER_AGENT.as_str()).contains("HeadlessChrome") {
        return StatusCode::IM_A_TEAPOT.into_response();
    }

    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    res
}

/// Admin pages: the session JWT must validate and carry `is_admin`.
pub async fn admin_auth(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    match user_from_jwt(&auth, req.headers()) {
        Ok(claims) if claims.is_admin => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Ok(claims) => {
            debug!(user_id = %claims.user_id, "non-admin denied");
            unauthorized_to_auth()
        }
        Err(err) => {
            debug!(error = %err, "admin authentication failed");
            unauthorized_to_auth()
        }
    }
}

/// Service-to-service calls: `x-machine-token` must match the configured token.
pub async fn machine_auth(State(auth): State<AuthState>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(MACHINE_TOKEN_HEADER)
        .map(HeaderValue::as_bytes)
        .unwrap_or_default();

    let matches = !auth.machine_token.is_empty()
        && bool::from(presented.ct_eq(auth.machine_token.as_bytes()));
    if !matches {
        return json_error(StatusCode::UNAUTHORIZED, "unauthorized", "invalid machine token");
    }
    next.run(req).await
}

/// End-user APIs: any failure is a bare 401.
pub async fn user_auth(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    match authenticate_from_cookie(&auth, req.headers()).await {
        Ok(token) => {
            req.extensions_mut().insert(token);
            next.run(req).await
        }
        Err(err) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string()),
    }
}

/// End-user pages: missing sessions go to `/auth`, stale tokens to the
/// auto-login page which signs in again and comes back.
pub async fn user_auth_page(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    match authenticate_from_cookie(&auth, req.headers()).await {
        Ok(token) => {
            req.extensions_mut().insert(token);
            next.run(req).await
        }
        Err(AuthError::NoAuthSession | AuthError::NoAuthCookie) => unauthorized_to_auth(),
        Err(AuthError::TokenVerificationFailed) => autologin(req.uri().path()),
    }
}

/// Pages that work signed in or out: attach the identity when there is one.
pub async fn inject_auth_token(State(auth): State<AuthState>, mut req: Request, next: Next) -> Response {
    match authenticate_from_cookie(&auth, req.headers()).await {
        Ok(token) => {
            req.extensions_mut().insert(token);
        }
        Err(AuthError::TokenVerificationFailed) => return autologin(req.uri().path()),
        Err(AuthError::NoAuthSession | AuthError::NoAuthCookie) => {}
    }
    next.run(req).await
}

/// Verify the session token with the identity provider.
pub async fn authenticate_from_cookie(auth: &AuthState, headers: &HeaderMap) -> Result<IdToken, AuthError> {
    let session = auth.sessions.load(headers)?;
    if session.is_new {
        debug!("request without session cookie");
    }
    let token = session.get(JWT_KEY).ok_or(AuthError::NoAuthCookie)?;

    auth.id_tokens.verify(token).await.map_err(|err| {
        debug!(error = %err, "id token verification failed");
        AuthError::TokenVerificationFailed
    })
}

/// Claims of the site JWT in the session. Signature and time window are checked.
pub fn user_from_jwt(auth: &AuthState, headers: &HeaderMap) -> Result<UserClaims, AuthError> {
    let session = auth.sessions.load(headers)?;
    let token = session.get(JWT_KEY).ok_or(AuthError::NoAuthCookie)?;
    auth.jwt
        .validate(token, Utc::now())
        .map_err(|_| AuthError::TokenVerificationFailed)
}

pub fn is_signed_on(auth: &AuthState, headers: &HeaderMap) -> bool {
    user_from_jwt(auth, headers).is_ok()
}

fn unauthorized_to_auth() -> Response {
    (StatusCode::UNAUTHORIZED, [(LOCATION, "/auth")]).into_response()
}

fn autologin(path: &str) -> Response {
    let direct_to = if path.is_empty() { DEFAULT_DIRECT_TO } else { path };
    Redirect::to(&format!("/autologin?directto={}", urlencoding::encode(direct_to))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{Extension, Router, body::Body, middleware::from_fn, middleware::from_fn_with_state, routing::get};
    use chrono::Duration;
    use jobboard_auth::{Hs256Jwt, IdTokenError};
    use jobboard_core::{User, UserType};
    use tower::ServiceExt;

    use crate::session::Session;

    const SESSION_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
    const JWT_SECRET: &str = "test-secret";

    /// Accepts exactly the token `good`.
    struct FakeProvider;

    #[async_trait]
    impl IdTokenVerifier for FakeProvider {
        async fn verify(&self, token: &str) -> Result<IdToken, jobboard_auth::IdTokenError> {
            if token != "good" {
                return Err(IdTokenError::Rejected("unknown token".into()));
            }
            let now = Utc::now();
            Ok(IdToken {
                uid: "uid-1".into(),
                email: Some("dev@example.com".into()),
                email_verified: true,
                issued_at: now,
                expires_at: now + Duration::minutes(5),
            })
        }
    }

    fn auth_state(machine_token: &str) -> AuthState {
        AuthState {
            sessions: SessionStore::new(SESSION_KEY, false),
            jwt: Arc::new(Hs256Jwt::new(JWT_SECRET)),
            id_tokens: Arc::new(FakeProvider),
            machine_token: machine_token.into(),
        }
    }

    fn session_cookie(token: &str) -> String {
        let mut session = Session::default();
        session.insert(JWT_KEY, token);
        SessionStore::new(SESSION_KEY, false)
            .save(&session)
            .encoded()
            .stripped()
            .to_string()
    }

    fn site_jwt(user_type: UserType) -> String {
        let now = Utc::now();
        let user = User::new("someone@example.com", user_type, now);
        Hs256Jwt::new(JWT_SECRET)
            .sign(&UserClaims::for_user(&user, now, Duration::minutes(10)))
            .unwrap()
    }

    async fn send(app: Router, req: axum::http::Request<Body>) -> Response {
        app.oneshot(req).await.unwrap()
    }

    fn get_req(uri: &str) -> axum::http::request::Builder {
        axum::http::Request::builder().uri(uri)
    }

    fn env_app(env: Environment) -> Router {
        Router::new()
            .route("/jobs", get(|| async { "ok" }))
            .layer(from_fn_with_state(env, security_headers))
            .layer(from_fn_with_state(env, https_redirect))
            .layer(from_fn(request_logging))
    }

    #[tokio::test]
    async fn plain_http_is_redirected_outside_dev() {
        let res = send(
            env_app(Environment::Production),
            get_req("/jobs?page=2").header("host", "golang.example").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers()[LOCATION], "https://golang.example/jobs");
    }

    #[tokio::test]
    async fn forwarded_https_and_dev_pass_through() {
        let res = send(
            env_app(Environment::Production),
            get_req("/jobs").header("x-forwarded-proto", "https").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-frame-options"], "deny");
        assert_eq!(res.headers()["referrer-policy"], "origin");
        assert_eq!(
            res.headers()["strict-transport-security"],
            "max-age=31536000; includeSubDomains"
        );

        let res = send(env_app(Environment::Development), get_req("/jobs").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("x-frame-options").is_none());
    }

    #[tokio::test]
    async fn headless_chrome_is_a_teapot() {
        let req = get_req("/jobs")
            .header("x-forwarded-proto", "https")
            .header("user-agent", "Mozilla/5.0 HeadlessChrome/120.0")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(env_app(Environment::Production), req).await.status(), StatusCode::IM_A_TEAPOT);

        let req = get_req("/jobs")
            .header("user-agent", "Mozilla/5.0 HeadlessChrome/120.0")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(env_app(Environment::Development), req).await.status(), StatusCode::OK);
    }

    fn admin_app() -> Router {
        Router::new()
            .route(
                "/admin",
                get(|Extension(claims): Extension<UserClaims>| async move { claims.email }),
            )
            .layer(from_fn_with_state(auth_state(""), admin_auth))
    }

    #[tokio::test]
    async fn admin_auth_requires_admin_claims() {
        let req = get_req("/admin")
            .header("cookie", session_cookie(&site_jwt(UserType::Admin)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(admin_app(), req).await.status(), StatusCode::OK);

        for cookie in [
            Some(session_cookie(&site_jwt(UserType::Recruiter))),
            Some(session_cookie("not-a-jwt")),
            Some("____gc=tampered".to_string()),
            None,
        ] {
            let mut req = get_req("/admin");
            if let Some(c) = cookie {
                req = req.header("cookie", c);
            }
            let res = send(admin_app(), req.body(Body::empty()).unwrap()).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(res.headers()[LOCATION], "/auth");
        }
    }

    #[tokio::test]
    async fn admin_auth_rejects_other_signing_keys() {
        let now = Utc::now();
        let user = User::new("admin@example.com", UserType::Admin, now);
        let forged = Hs256Jwt::new("another-secret")
            .sign(&UserClaims::for_user(&user, now, Duration::minutes(10)))
            .unwrap();
        let req = get_req("/admin")
            .header("cookie", session_cookie(&forged))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(admin_app(), req).await.status(), StatusCode::UNAUTHORIZED);
    }

    fn machine_app(token: &str) -> Router {
        Router::new()
            .route("/machine", get(|| async { "ok" }))
            .layer(from_fn_with_state(auth_state(token), machine_auth))
    }

    #[tokio::test]
    async fn machine_auth_compares_tokens() {
        let ok = get_req("/machine").header(MACHINE_TOKEN_HEADER, "s3cret").body(Body::empty()).unwrap();
        assert_eq!(send(machine_app("s3cret"), ok).await.status(), StatusCode::OK);

        let wrong = get_req("/machine").header(MACHINE_TOKEN_HEADER, "s3cre").body(Body::empty()).unwrap();
        assert_eq!(send(machine_app("s3cret"), wrong).await.status(), StatusCode::UNAUTHORIZED);

        let missing = get_req("/machine").body(Body::empty()).unwrap();
        assert_eq!(send(machine_app("s3cret"), missing).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unconfigured_machine_token_matches_nothing() {
        let empty = get_req("/machine").header(MACHINE_TOKEN_HEADER, "").body(Body::empty()).unwrap();
        assert_eq!(send(machine_app(""), empty).await.status(), StatusCode::UNAUTHORIZED);

        let absent = get_req("/machine").body(Body::empty()).unwrap();
        assert_eq!(send(machine_app(""), absent).await.status(), StatusCode::UNAUTHORIZED);
    }

    fn user_app() -> Router {
        let who = |token: Option<Extension<IdToken>>| async move {
            token.map(|Extension(t)| t.uid).unwrap_or_else(|| "anonymous".to_string())
        };
        Router::new()
            .route(
                "/api/me",
                get(who).layer(from_fn_with_state(auth_state(""), user_auth)),
            )
            .route(
                "/profile/home",
                get(who).layer(from_fn_with_state(auth_state(""), user_auth_page)),
            )
            .route(
                "/jobs",
                get(who).layer(from_fn_with_state(auth_state(""), inject_auth_token)),
            )
    }

    async fn body_text(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn with_cookie(uri: &str, cookie: Option<String>) -> axum::http::Request<Body> {
        let mut req = get_req(uri);
        if let Some(c) = cookie {
            req = req.header("cookie", c);
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn user_auth_api_is_401_on_any_failure() {
        let ok = send(user_app(), with_cookie("/api/me", Some(session_cookie("good")))).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(body_text(ok).await, "uid-1");

        for cookie in [None, Some(session_cookie("bad")), Some("____gc=junk".to_string())] {
            let res = send(user_app(), with_cookie("/api/me", cookie)).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn user_pages_redirect_by_failure_kind() {
        let res = send(user_app(), with_cookie("/profile/home", None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[LOCATION], "/auth");

        let res = send(user_app(), with_cookie("/profile/home", Some(session_cookie("expired")))).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[LOCATION], "/autologin?directto=%2Fprofile%2Fhome");

        let res = send(user_app(), with_cookie("/profile/home", Some(session_cookie("good")))).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn inject_auth_token_is_optional() {
        let res = send(user_app(), with_cookie("/jobs", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "anonymous");

        let res = send(user_app(), with_cookie("/jobs", Some(session_cookie("good")))).await;
        assert_eq!(body_text(res).await, "uid-1");

        let res = send(user_app(), with_cookie("/jobs", Some(session_cookie("stale")))).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[LOCATION], "/autologin?directto=%2Fjobs");
    }

    #[test]
    fn autologin_target_is_percent_encoded() {
        let res = autologin("/jobs/rust&go+c");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[LOCATION], "/autologin?directto=%2Fjobs%2Frust%26go%2Bc");

        assert_eq!(autologin("").headers()[LOCATION], "/autologin?directto=%2Fprofile%2Fhome");
    }

    #[test]
    fn session_helpers() {
        let auth = auth_state("");
        let mut headers = HeaderMap::new();
        assert_eq!(user_from_jwt(&auth, &headers), Err(AuthError::NoAuthCookie));
        assert!(!is_signed_on(&auth, &headers));

        headers.insert(header::COOKIE, session_cookie(&site_jwt(UserType::Developer)).parse().unwrap());
        let claims = user_from_jwt(&auth, &headers).unwrap();
        assert!(claims.is_developer);
        assert!(is_signed_on(&auth, &headers));

        headers.insert(header::COOKIE, session_cookie("garbage").parse().unwrap());
        assert_eq!(user_from_jwt(&auth, &headers), Err(AuthError::TokenVerificationFailed));
    }
}
