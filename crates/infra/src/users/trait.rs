use async_trait::async_trait;
use thiserror::Error;

use jobboard_core::{User, UserId, UserType};

/// Storage operations over user accounts and sign-on tokens.
///
/// Each call stands alone; nothing here composes calls into a transaction.
/// Lookups that find nothing return `Ok(None)` rather than an error.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Record a freshly issued sign-on token for `email`.
    async fn save_token_sign_on(
        &self,
        email: &str,
        token: &str,
        user_type: UserType,
    ) -> Result<(), RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn update_access_token(&self, id: UserId, access_token: &str) -> Result<(), RepositoryError>;

    async fn update_refresh_token(&self, id: UserId, refresh_token: &str) -> Result<(), RepositoryError>;

    /// Resolve a sign-on token to its account, creating the account on first use.
    ///
    /// Returns the user and whether it already existed. Unknown and expired
    /// tokens yield [`RepositoryError::TokenNotFound`].
    async fn get_or_create_user_from_token(&self, token: &str) -> Result<(User, bool), RepositoryError>;

    /// Returns the number of accounts removed (0 or 1).
    async fn delete_user_by_email(&self, email: &str) -> Result<u64, RepositoryError>;

    /// Remove sign-on tokens older than [`jobboard_core::SIGN_ON_TOKEN_TTL`].
    async fn delete_expired_sign_on_tokens(&self) -> Result<u64, RepositoryError>;

    /// Account type for `email`.
    ///
    /// Falls back to the recruiter and then developer profile tables for
    /// people who have a profile but never completed sign-on.
    async fn get_user_type_by_email(&self, email: &str) -> Result<Option<UserType>, RepositoryError>;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("sign-on token not found or expired")]
    TokenNotFound,

    /// Unique constraint hit, e.g. an email that already has an account.
    #[error("conflict in {operation}: {message}")]
    Conflict { operation: &'static str, message: String },

    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A stored value could not be mapped back to a domain type.
    #[error("corrupt row in {operation}: {message}")]
    Corrupt { operation: &'static str, message: String },

    #[error("storage error: {0}")]
    Storage(String),
}
