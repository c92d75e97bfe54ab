//! Verification of ID tokens issued by the external identity provider.
//!
//! End-user pages and APIs trust the provider's token (kept in the session
//! cookie) rather than the site's own JWT.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A verified provider identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdToken {
    /// Provider-side user id (`sub`).
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdTokenError {
    #[error("invalid verifier key: {0}")]
    Key(String),

    #[error("id token expired")]
    Expired,

    #[error("id token rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdToken, IdTokenError>;
}

#[derive(Debug, Deserialize)]
struct ProviderClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    iat: i64,
    exp: i64,
}

/// Verifies provider tokens locally against a configured key, issuer and audience.
pub struct JwtIdTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdTokenVerifier {
    /// RS256 tokens checked against the provider's PEM-encoded public key.
    pub fn rs256_pem(pem: &[u8], issuer: &str, audience: &str) -> Result<Self, IdTokenError> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| IdTokenError::Key(e.to_string()))?;
        Ok(Self::with_key(key, Algorithm::RS256, issuer, audience))
    }

    /// HS256 tokens signed with a shared secret (self-hosted providers, tests).
    pub fn hs256(secret: &[u8], issuer: &str, audience: &str) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256, issuer, audience)
    }

    fn with_key(key: DecodingKey, alg: Algorithm, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;
        Self { key, validation }
    }
}

#[async_trait]
impl IdTokenVerifier for JwtIdTokenVerifier {
    async fn verify(&self, token: &str) -> Result<IdToken, IdTokenError> {
        let data = decode::<ProviderClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdTokenError::Expired,
                _ => IdTokenError::Rejected(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let timestamp = |secs: i64| {
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| IdTokenError::Rejected(format!("timestamp out of range: {secs}")))
        };

        Ok(IdToken {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"provider-secret";
    const ISS: &str = "https://idp.example.com/jobboard";
    const AUD: &str = "jobboard";

    fn mint(claims: serde_json::Value) -> String {
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn base_claims() -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": "uid-123",
            "email": "dev@example.com",
            "email_verified": true,
            "iss": ISS,
            "aud": AUD,
            "iat": now,
            "exp": now + 600,
        })
    }

    #[tokio::test]
    async fn accepts_token_from_configured_provider() {
        let verifier = JwtIdTokenVerifier::hs256(SECRET, ISS, AUD);
        let token = verifier.verify(&mint(base_claims())).await.unwrap();

        assert_eq!(token.uid, "uid-123");
        assert_eq!(token.email.as_deref(), Some("dev@example.com"));
        assert!(token.email_verified);
        assert!(token.expires_at > token.issued_at);
    }

    #[tokio::test]
    async fn rejects_other_audience() {
        let verifier = JwtIdTokenVerifier::hs256(SECRET, ISS, AUD);
        let mut claims = base_claims();
        claims["aud"] = json!("someone-else");

        let err = verifier.verify(&mint(claims)).await.unwrap_err();
        assert!(matches!(err, IdTokenError::Rejected(_)));
    }

    #[tokio::test]
    async fn reports_expiry_separately() {
        let verifier = JwtIdTokenVerifier::hs256(SECRET, ISS, AUD);
        let mut claims = base_claims();
        let past = Utc::now().timestamp() - 3600;
        claims["iat"] = json!(past - 600);
        claims["exp"] = json!(past);

        assert_eq!(verifier.verify(&mint(claims)).await.unwrap_err(), IdTokenError::Expired);
    }

    #[test]
    fn bad_pem_is_a_key_error() {
        let err = JwtIdTokenVerifier::rs256_pem(b"not a pem", ISS, AUD).err().unwrap();
        assert!(matches!(err, IdTokenError::Key(_)));
    }
}
