//! Signed cookie sessions.
//!
//! The whole session lives client-side in one cookie: a JSON map of string
//! values, HMAC-signed so it cannot be forged or edited.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, CookieJar, Key, SameSite};

use crate::app::errors::AuthError;

pub const SESSION_COOKIE: &str = "____gc";

/// Session key holding the caller's token.
pub const JWT_KEY: &str = "jwt";

const MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    values: BTreeMap<String, String>,
    /// No session cookie came with the request.
    pub is_new: bool,
}

impl Session {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

/// Loads and signs session cookies with one key.
#[derive(Clone)]
pub struct SessionStore {
    key: Key,
    secure: bool,
}

impl SessionStore {
    /// `master` must be at least 32 bytes; signing keys are derived from it.
    pub fn new(master: &[u8], secure: bool) -> Self {
        Self {
            key: Key::derive_from(master),
            secure,
        }
    }

    pub fn load(&self, headers: &HeaderMap) -> Result<Session, AuthError> {
        let jar = request_jar(headers);
        if jar.get(SESSION_COOKIE).is_none() {
            return Ok(Session {
                is_new: true,
                ..Session::default()
            });
        }

        let verified = jar.signed(&self.key).get(SESSION_COOKIE).ok_or(AuthError::NoAuthSession)?;
        let values = serde_json::from_str(verified.value()).map_err(|_| AuthError::NoAuthSession)?;
        Ok(Session { values, is_new: false })
    }

    /// Cookie carrying `session`, ready for a `Set-Cookie` header.
    pub fn save(&self, session: &Session) -> Cookie<'static> {
        // A BTreeMap<String, String> always serializes.
        let value = serde_json::to_string(&session.values).unwrap_or_else(|_| "{}".to_string());

        let cookie = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(CookieDuration::days(MAX_AGE_DAYS))
            .build();

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(cookie);
        jar.get(SESSION_COOKIE).cloned().unwrap_or_else(|| self.clear())
    }

    /// Cookie that makes the browser drop the session.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
        cookie.make_removal();
        cookie
    }
}

/// Render `cookie` as a `Set-Cookie` header value.
pub fn set_cookie_value(cookie: &Cookie<'_>) -> String {
    cookie.encoded().to_string()
}

fn request_jar(headers: &HeaderMap) -> CookieJar {
    let mut jar = CookieJar::new();
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else { continue };
        for cookie in Cookie::split_parse_encoded(header).flatten() {
            jar.add_original(cookie.into_owned());
        }
    }
    jar
}
