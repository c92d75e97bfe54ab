//! User accounts and one-time sign-on tokens.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::humanize::humanize_since;
use crate::id::UserId;

/// Sign-on tokens stop resolving, and become eligible for purging, after this long.
pub const SIGN_ON_TOKEN_TTL: Duration = Duration::days(7);

/// Kind of account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Developer,
    Admin,
    Recruiter,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Developer => "developer",
            UserType::Admin => "admin",
            UserType::Recruiter => "recruiter",
        }
    }
}

impl core::fmt::Display for UserType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for UserType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "developer" => Ok(UserType::Developer),
            "admin" => Ok(UserType::Admin),
            "recruiter" => Ok(UserType::Recruiter),
            other => Err(DomainError::validation(format!("unknown user type '{other}'"))),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub email_verified: bool,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user_type: UserType,
    /// Display form of `created_at`, e.g. `"2 weeks ago"`.
    pub created_at_humanized: String,
}

impl User {
    /// A brand-new, unverified account without provider tokens.
    pub fn new(email: impl Into<String>, user_type: UserType, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            email_verified: false,
            access_token: None,
            refresh_token: None,
            expiration_time: None,
            created_at: now,
            user_type,
            created_at_humanized: humanize_since(now, now),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    /// Recompute `created_at_humanized` against `now`.
    pub fn humanize(mut self, now: DateTime<Utc>) -> Self {
        self.created_at_humanized = humanize_since(self.created_at, now);
        self
    }
}

/// Single-use credential pairing a token string with an email and account type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOnToken {
    pub token: String,
    pub email: String,
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
}

impl SignOnToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.created_at + SIGN_ON_TOKEN_TTL <= now
    }
}
