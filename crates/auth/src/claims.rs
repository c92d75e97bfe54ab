use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use jobboard_core::{User, UserId, UserType};

/// Claims carried by the site's session JWT.
///
/// Never persisted: the token is stored in the session cookie and the claims
/// are reconstructed from it on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub is_admin: bool,
    pub is_recruiter: bool,
    pub is_developer: bool,
    pub user_id: UserId,
    pub email: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,

    /// Issued-at (seconds since the epoch).
    pub iat: i64,
    /// Expiry (seconds since the epoch).
    pub exp: i64,
}

impl UserClaims {
    /// Claims for `user`, valid from `now` for `ttl`.
    ///
    /// An expiry past the representable range is clamped to the latest
    /// representable instant.
    pub fn for_user(user: &User, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            is_admin: user.user_type == UserType::Admin,
            is_recruiter: user.user_type == UserType::Recruiter,
            is_developer: user.user_type == UserType::Developer,
            user_id: user.id,
            email: user.email.clone(),
            user_type: user.user_type,
            created_at: user.created_at,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
                .timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Check the claim time window against `now`.
///
/// Signature verification happens before this, in [`crate::JwtValidator`].
pub fn validate_claims(claims: &UserClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
