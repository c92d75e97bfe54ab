use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use jobboard_core::{SignOnToken, User, UserId, UserType};

use super::r#trait::{RepositoryError, UserRepository};

/// In-memory user repository.
///
/// Intended for tests/dev. Mirrors the Postgres semantics, including email
/// uniqueness and the profile-table fallback of `get_user_type_by_email`.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
    tokens: RwLock<HashMap<String, SignOnToken>>,
    recruiter_profiles: RwLock<HashSet<String>>,
    developer_profiles: RwLock<HashSet<String>>,
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token as-is, including its `created_at` (useful for backdating).
    pub fn insert_sign_on_token(&self, token: SignOnToken) -> Result<(), RepositoryError> {
        self.tokens
            .write()
            .map_err(poisoned)?
            .insert(token.token.clone(), token);
        Ok(())
    }

    pub fn sign_on_token_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.tokens.read().map_err(poisoned)?.len())
    }

    pub fn add_recruiter_profile(&self, email: impl Into<String>) -> Result<(), RepositoryError> {
        self.recruiter_profiles.write().map_err(poisoned)?.insert(email.into());
        Ok(())
    }

    pub fn add_developer_profile(&self, email: impl Into<String>) -> Result<(), RepositoryError> {
        self.developer_profiles.write().map_err(poisoned)?.insert(email.into());
        Ok(())
    }

    fn update(&self, id: UserId, f: impl FnOnce(&mut User)) -> Result<(), RepositoryError> {
        // Like `UPDATE ... WHERE id = $1`: a missing row is not an error.
        if let Some(user) = self.users.write().map_err(poisoned)?.get_mut(&id) {
            f(user);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save_token_sign_on(
        &self,
        email: &str,
        token: &str,
        user_type: UserType,
    ) -> Result<(), RepositoryError> {
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        if tokens.contains_key(token) {
            return Err(RepositoryError::Conflict {
                operation: "save_token_sign_on",
                message: "token already exists".to_string(),
            });
        }
        tokens.insert(
            token.to_string(),
            SignOnToken {
                token: token.to_string(),
                email: email.to_string(),
                user_type,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(&id).cloned().map(|u| u.humanize(Utc::now())))
    }

    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(&user.id) || users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict {
                operation: "create_user",
                message: format!("user {} already exists", user.email),
            });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_access_token(&self, id: UserId, access_token: &str) -> Result<(), RepositoryError> {
        self.update(id, |u| u.access_token = Some(access_token.to_string()))
    }

    async fn update_refresh_token(&self, id: UserId, refresh_token: &str) -> Result<(), RepositoryError> {
        self.update(id, |u| u.refresh_token = Some(refresh_token.to_string()))
    }

    async fn get_or_create_user_from_token(&self, token: &str) -> Result<(User, bool), RepositoryError> {
        let now = Utc::now();
        let sign_on = self
            .tokens
            .read()
            .map_err(poisoned)?
            .get(token)
            .filter(|t| !t.is_expired(now))
            .cloned()
            .ok_or(RepositoryError::TokenNotFound)?;

        // Held across lookup and insert so concurrent resolutions agree on one user.
        let mut users = self.users.write().map_err(poisoned)?;
        if let Some(existing) = users.values().find(|u| u.email == sign_on.email) {
            return Ok((existing.clone().humanize(now), true));
        }

        let user = User::new(sign_on.email, sign_on.user_type, now);
        users.insert(user.id, user.clone());
        Ok((user, false))
    }

    async fn delete_user_by_email(&self, email: &str) -> Result<u64, RepositoryError> {
        let mut users = self.users.write().map_err(poisoned)?;
        let before = users.len();
        users.retain(|_, u| u.email != email);
        Ok((before - users.len()) as u64)
    }

    async fn delete_expired_sign_on_tokens(&self) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let mut tokens = self.tokens.write().map_err(poisoned)?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired(now));
        Ok((before - tokens.len()) as u64)
    }

    async fn get_user_type_by_email(&self, email: &str) -> Result<Option<UserType>, RepositoryError> {
        if let Some(u) = self.users.read().map_err(poisoned)?.values().find(|u| u.email == email) {
            return Ok(Some(u.user_type));
        }
        if self.recruiter_profiles.read().map_err(poisoned)?.contains(email) {
            return Ok(Some(UserType::Recruiter));
        }
        if self.developer_profiles.read().map_err(poisoned)?.contains(email) {
            return Ok(Some(UserType::Developer));
        }
        Ok(None)
    }
}
