//! `jobboard-auth` — token boundary for the site.
//!
//! Two kinds of tokens cross this boundary: the site's own HS256 session JWT
//! ([`UserClaims`]) and ID tokens minted by the external identity provider
//! ([`IdToken`]). This crate knows nothing about HTTP, cookies or storage.

pub mod claims;
pub mod identity;
pub mod jwt;

pub use claims::{TokenValidationError, UserClaims, validate_claims};
pub use identity::{IdToken, IdTokenError, IdTokenVerifier, JwtIdTokenVerifier};
pub use jwt::{Hs256Jwt, JwtError, JwtValidator};
