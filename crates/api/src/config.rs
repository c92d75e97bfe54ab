//! Process configuration, read once at startup from the environment.
//!
//! A `.env` file in the working directory is honoured (see `main.rs`).

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-jwt-secret";
const DEV_SESSION_KEY: &str = "dev-session-key-dev-session-key-dev-session-key";

/// Minimum length of `SESSION_KEY`, in bytes.
pub const MIN_SESSION_KEY_LEN: usize = 32;

/// Longest accepted `JWT_TTL_HOURS`: one year.
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// `dev` selects development; any other value is production.
    pub fn from_name(name: &str) -> Self {
        if name == "dev" {
            Self::Development
        } else {
            Self::Production
        }
    }

    pub fn is_dev(self) -> bool {
        self == Self::Development
    }
}

/// Key material the identity provider signs ID tokens with.
#[derive(Clone)]
pub enum IdpKey {
    RsaPublicPem(String),
    SharedSecret(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Clone)]
pub struct Config {
    pub env: Environment,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub session_key: Vec<u8>,
    pub machine_token: String,
    pub idp_issuer: String,
    pub idp_audience: String,
    pub idp_key: IdpKey,
    pub template_dir: PathBuf,
    pub jwt_ttl: chrono::Duration,
    /// `None` disables the sign-on token purge worker.
    pub purge_interval: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `load` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let env = Environment::from_name(&get("ENV").unwrap_or_else(|| "dev".to_string()));

        let jwt_secret = dev_default(env, "JWT_SECRET", get("JWT_SECRET"), DEV_JWT_SECRET)?;
        let session_key = dev_default(env, "SESSION_KEY", get("SESSION_KEY"), DEV_SESSION_KEY)?;
        if session_key.len() < MIN_SESSION_KEY_LEN {
            return Err(ConfigError::Invalid {
                key: "SESSION_KEY",
                message: format!("must be at least {MIN_SESSION_KEY_LEN} bytes"),
            });
        }

        let idp_key = match (get("IDP_PUBLIC_KEY_PEM"), get("IDP_SHARED_SECRET")) {
            (Some(pem), _) => IdpKey::RsaPublicPem(pem),
            (None, Some(secret)) => IdpKey::SharedSecret(secret),
            (None, None) => return Err(ConfigError::Missing("IDP_PUBLIC_KEY_PEM or IDP_SHARED_SECRET")),
        };

        let machine_token = get("MACHINE_TOKEN").unwrap_or_default();
        if machine_token.is_empty() {
            warn!("MACHINE_TOKEN not set; machine endpoints will reject every request");
        }

        let jwt_ttl_hours: i64 = try_load(&get, "JWT_TTL_HOURS", "720")?;
        let jwt_ttl = (1..=MAX_JWT_TTL_HOURS)
            .contains(&jwt_ttl_hours)
            .then(|| chrono::Duration::hours(jwt_ttl_hours))
            .ok_or_else(|| ConfigError::Invalid {
                key: "JWT_TTL_HOURS",
                message: format!("{jwt_ttl_hours} is not between 1 and {MAX_JWT_TTL_HOURS} hours"),
            })?;
        let purge_secs: u64 = try_load(&get, "SIGN_ON_PURGE_INTERVAL_SECS", "3600")?;

        Ok(Self {
            env,
            port: try_load(&get, "PORT", "9876")?,
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            jwt_secret,
            session_key: session_key.into_bytes(),
            machine_token,
            idp_issuer: get("IDP_ISSUER").ok_or(ConfigError::Missing("IDP_ISSUER"))?,
            idp_audience: get("IDP_AUDIENCE").ok_or(ConfigError::Missing("IDP_AUDIENCE"))?,
            idp_key,
            template_dir: get("TEMPLATE_DIR").unwrap_or_else(|| "static/views".to_string()).into(),
            jwt_ttl,
            purge_interval: (purge_secs > 0).then(|| Duration::from_secs(purge_secs)),
        })
    }
}

fn dev_default(
    env: Environment,
    key: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) => Ok(v),
        None if env.is_dev() => {
            warn!("{key} not set; using insecure dev default");
            Ok(default.to_string())
        }
        None => Err(ConfigError::Missing(key)),
    }
}

fn try_load<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    get(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}
