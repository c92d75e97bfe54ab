use std::sync::Arc;

use jobboard_auth::{Hs256Jwt, IdTokenError, IdTokenVerifier, JwtIdTokenVerifier};
use jobboard_infra::UserRepository;
use jobboard_templates::Templates;

use crate::config::{Config, Environment, IdpKey};
use crate::middleware::AuthState;
use crate::session::SessionStore;

/// Everything handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub env: Environment,
    pub templates: Templates,
    pub users: Arc<dyn UserRepository>,
    pub auth: AuthState,
    /// Signs the site JWT handed out on sign-on.
    pub signer: Hs256Jwt,
    pub jwt_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(
        config: &Config,
        templates: Templates,
        users: Arc<dyn UserRepository>,
    ) -> Result<Self, IdTokenError> {
        let id_tokens: Arc<dyn IdTokenVerifier> = match &config.idp_key {
            IdpKey::RsaPublicPem(pem) => Arc::new(JwtIdTokenVerifier::rs256_pem(
                pem.as_bytes(),
                &config.idp_issuer,
                &config.idp_audience,
            )?),
            IdpKey::SharedSecret(secret) => Arc::new(JwtIdTokenVerifier::hs256(
                secret.as_bytes(),
                &config.idp_issuer,
                &config.idp_audience,
            )),
        };

        let signer = Hs256Jwt::new(&config.jwt_secret);
        let auth = AuthState {
            sessions: SessionStore::new(&config.session_key, !config.env.is_dev()),
            jwt: Arc::new(signer.clone()),
            id_tokens,
            machine_token: config.machine_token.as_str().into(),
        };

        Ok(Self {
            env: config.env,
            templates,
            users,
            auth,
            signer,
            jwt_ttl: config.jwt_ttl,
        })
    }
}
