//! `jobboard-core` — domain types shared by every other crate.
//!
//! No IO lives here: storage, HTTP and rendering depend on this crate, never
//! the other way around.

pub mod error;
pub mod humanize;
pub mod id;
pub mod user;

pub use error::DomainError;
pub use id::UserId;
pub use user::{SIGN_ON_TOKEN_TTL, SignOnToken, User, UserType};
