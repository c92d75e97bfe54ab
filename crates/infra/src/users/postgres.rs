//! Postgres-backed user repository.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Database` |
//! | RowNotFound | N/A | never surfaced; lookups use `fetch_optional` |
//! | Other | N/A | `Database` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use jobboard_core::{SIGN_ON_TOKEN_TTL, User, UserId, UserType};

use super::r#trait::{RepositoryError, UserRepository};

/// User repository over a shared SQLx connection pool.
///
/// Cloning is cheap; `PgPool` is reference counted internally.
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    email_verified: Option<bool>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expiration_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    user_type: String,
}

impl UserRow {
    fn into_user(self, operation: &'static str, now: DateTime<Utc>) -> Result<User, RepositoryError> {
        Ok(User {
            id: UserId::from_uuid(self.id),
            email: self.email,
            email_verified: self.email_verified.unwrap_or(false),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiration_time: self.expiration_time,
            created_at: self.created_at,
            user_type: parse_user_type(operation, &self.user_type)?,
            created_at_humanized: String::new(),
        }
        .humanize(now))
    }
}

const USER_COLUMNS: &str =
    "id, email, email_verified, access_token, refresh_token, expiration_time, created_at, user_type";

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, token), fields(user_type = %user_type), err)]
    async fn save_token_sign_on(
        &self,
        email: &str,
        token: &str,
        user_type: UserType,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_sign_on_token (token, email, user_type, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(token)
        .bind(email)
        .bind(user_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_token_sign_on", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        row.map(|r| r.into_user("get_user", Utc::now())).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                email,
                created_at,
                user_type,
                email_verified,
                access_token,
                refresh_token,
                expiration_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.created_at)
        .bind(user.user_type.as_str())
        .bind(user.email_verified)
        .bind(user.access_token.as_deref())
        .bind(user.refresh_token.as_deref())
        .bind(user.expiration_time)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, access_token), fields(user_id = %id), err)]
    async fn update_access_token(&self, id: UserId, access_token: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET access_token = $1 WHERE id = $2")
            .bind(access_token)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_access_token", e))?;
        Ok(())
    }

    #[instrument(skip(self, refresh_token), fields(user_id = %id), err)]
    async fn update_refresh_token(&self, id: UserId, refresh_token: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(refresh_token)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_refresh_token", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(existed = tracing::field::Empty), err)]
    async fn get_or_create_user_from_token(&self, token: &str) -> Result<(User, bool), RepositoryError> {
        const OP: &str = "get_or_create_user_from_token";
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            SELECT
                t.email AS token_email,
                t.user_type AS token_user_type,
                u.id,
                u.email,
                u.email_verified,
                u.access_token,
                u.refresh_token,
                u.expiration_time,
                u.created_at,
                u.user_type
            FROM user_sign_on_token t
            LEFT JOIN users u ON u.email = t.email
            WHERE t.token = $1 AND t.created_at > $2
            "#,
        )
        .bind(token)
        .bind(now - SIGN_ON_TOKEN_TTL)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?
        .ok_or(RepositoryError::TokenNotFound)?;

        let span = Span::current();

        let existing_id: Option<Uuid> = row.try_get("id").map_err(|e| corrupt(OP, e))?;
        if existing_id.is_some() {
            let user = UserRow::from_row(&row).map_err(|e| corrupt(OP, e))?;
            span.record("existed", true);
            return Ok((user.into_user(OP, now)?, true));
        }

        let email: String = row.try_get("token_email").map_err(|e| corrupt(OP, e))?;
        let user_type: String = row.try_get("token_user_type").map_err(|e| corrupt(OP, e))?;
        let user = User::new(email, parse_user_type(OP, &user_type)?, now);

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, email, created_at, user_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.created_at)
        .bind(user.user_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?
        .rows_affected();

        if inserted == 0 {
            // Lost a race with another resolution of a token for the same email.
            let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(&user.email)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;
            span.record("existed", true);
            return Ok((row.into_user(OP, now)?, true));
        }

        span.record("existed", false);
        Ok((user, false))
    }

    #[instrument(skip(self), err)]
    async fn delete_user_by_email(&self, email: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user_by_email", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn delete_expired_sign_on_tokens(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM user_sign_on_token WHERE created_at <= $1")
            .bind(Utc::now() - SIGN_ON_TOKEN_TTL)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_expired_sign_on_tokens", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn get_user_type_by_email(&self, email: &str) -> Result<Option<UserType>, RepositoryError> {
        const OP: &str = "get_user_type_by_email";

        let user_type: Option<String> = sqlx::query_scalar("SELECT user_type FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        if let Some(t) = user_type {
            return parse_user_type(OP, &t).map(Some);
        }

        // Unverified recruiter or developer: has a profile but no account yet.
        for (table, user_type) in [
            ("recruiter_profile", UserType::Recruiter),
            ("developer_profile", UserType::Developer),
        ] {
            let found: Option<i32> = sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;
            if found.is_some() {
                return Ok(Some(user_type));
            }
        }

        Ok(None)
    }
}

fn parse_user_type(operation: &'static str, raw: &str) -> Result<UserType, RepositoryError> {
    raw.parse().map_err(|e: jobboard_core::DomainError| RepositoryError::Corrupt {
        operation,
        message: e.to_string(),
    })
}

fn corrupt(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::Corrupt {
        operation,
        message: err.to_string(),
    }
}

/// Map SQLx errors to repository errors.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return RepositoryError::Conflict {
                operation,
                message: db_err.message().to_string(),
            };
        }
    }
    RepositoryError::Database { operation, source: err }
}

// These run against a real database and are skipped when `DATABASE_URL` is
// unset. Every test uses fresh emails and tokens so runs can share a database.
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tokio::sync::Mutex;

    use crate::db;

    static SCHEMA_APPLIED: Mutex<bool> = Mutex::const_new(false);

    async fn repo() -> Option<PostgresUserRepository> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = db::connect(&url, 2).await.unwrap();

        // Concurrent CREATE TABLE IF NOT EXISTS can still collide in Postgres.
        let mut applied = SCHEMA_APPLIED.lock().await;
        if !*applied {
            db::apply_schema(&pool).await.unwrap();
            *applied = true;
        }
        drop(applied);

        Some(PostgresUserRepository::new(pool))
    }

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::now_v7())
    }

    fn email() -> String {
        format!("{}@example.com", unique("user"))
    }

    async fn insert_token_aged(repo: &PostgresUserRepository, token: &str, email: &str, age: Duration) {
        sqlx::query("INSERT INTO user_sign_on_token (token, email, user_type, created_at) VALUES ($1, $2, $3, $4)")
            .bind(token)
            .bind(email)
            .bind(UserType::Developer.as_str())
            .bind(Utc::now() - age)
            .execute(&repo.pool)
            .await
            .unwrap();
    }

    async fn token_exists(repo: &PostgresUserRepository, token: &str) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1 FROM user_sign_on_token WHERE token = $1")
            .bind(token)
            .fetch_optional(&repo.pool)
            .await
            .unwrap()
            .is_some()
    }

    async fn add_profile(repo: &PostgresUserRepository, table: &str, email: &str) {
        sqlx::query(&format!("INSERT INTO {table} (id, email) VALUES ($1, $2)"))
            .bind(Uuid::now_v7())
            .bind(email)
            .execute(&repo.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn token_creates_a_user_once_per_email() {
        let Some(repo) = repo().await else { return };
        let email = email();
        let first = unique("tok");
        let second = unique("tok");

        repo.save_token_sign_on(&email, &first, UserType::Recruiter).await.unwrap();
        let (created, existed) = repo.get_or_create_user_from_token(&first).await.unwrap();
        assert!(!existed);
        assert_eq!(created.email, email);
        assert_eq!(created.user_type, UserType::Recruiter);
        assert!(!created.created_at_humanized.is_empty());

        let (again, existed) = repo.get_or_create_user_from_token(&first).await.unwrap();
        assert!(existed);
        assert_eq!(again.id, created.id);

        // A second token for the same email resolves to the same account.
        repo.save_token_sign_on(&email, &second, UserType::Developer).await.unwrap();
        let (other, existed) = repo.get_or_create_user_from_token(&second).await.unwrap();
        assert!(existed);
        assert_eq!(other.id, created.id);
        assert_eq!(other.user_type, UserType::Recruiter);

        let stored = repo.get_user(created.id).await.unwrap().unwrap();
        assert_eq!(stored.email, email);
    }

    #[tokio::test]
    async fn concurrent_resolution_of_one_email_yields_one_user() {
        let Some(repo) = repo().await else { return };
        let email = email();
        let tokens: Vec<String> = (0..4).map(|_| unique("tok")).collect();
        for t in &tokens {
            repo.save_token_sign_on(&email, t, UserType::Developer).await.unwrap();
        }

        let results = resolve_all(&repo, &tokens).await;
        let ids: std::collections::HashSet<_> = results.iter().map(|(u, _)| u.id).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(results.iter().filter(|(_, existed)| !existed).count(), 1);
    }

    async fn resolve_all(repo: &PostgresUserRepository, tokens: &[String]) -> Vec<(User, bool)> {
        let mut handles = Vec::new();
        for t in tokens {
            let repo = repo.clone();
            let t = t.clone();
            handles.push(tokio::spawn(async move { repo.get_or_create_user_from_token(&t).await }));
        }
        let mut out = Vec::new();
        for h in handles {
            out.push(h.await.unwrap().unwrap());
        }
        out
    }

    #[tokio::test]
    async fn expired_tokens_never_resolve_and_are_purged() {
        let Some(repo) = repo().await else { return };
        let email = email();
        let expired = unique("tok");
        let almost = unique("tok");

        insert_token_aged(&repo, &expired, &email, SIGN_ON_TOKEN_TTL + Duration::minutes(1)).await;
        insert_token_aged(&repo, &almost, &email, SIGN_ON_TOKEN_TTL - Duration::minutes(1)).await;

        assert!(matches!(
            repo.get_or_create_user_from_token(&expired).await,
            Err(RepositoryError::TokenNotFound)
        ));
        assert!(matches!(
            repo.get_or_create_user_from_token(&unique("missing")).await,
            Err(RepositoryError::TokenNotFound)
        ));

        // Other tests may have expired rows too, so only a lower bound holds.
        let deleted = repo.delete_expired_sign_on_tokens().await.unwrap();
        assert!(deleted >= 1);
        assert!(!token_exists(&repo, &expired).await);
        assert!(token_exists(&repo, &almost).await);

        let (user, existed) = repo.get_or_create_user_from_token(&almost).await.unwrap();
        assert!(!existed);
        assert_eq!(user.email, email);
    }

    #[tokio::test]
    async fn user_type_falls_back_to_profiles() {
        let Some(repo) = repo().await else { return };
        let recruiter = email();
        let developer = email();
        let both = email();

        add_profile(&repo, "recruiter_profile", &recruiter).await;
        add_profile(&repo, "developer_profile", &developer).await;
        add_profile(&repo, "recruiter_profile", &both).await;
        add_profile(&repo, "developer_profile", &both).await;

        assert_eq!(repo.get_user_type_by_email(&recruiter).await.unwrap(), Some(UserType::Recruiter));
        assert_eq!(repo.get_user_type_by_email(&developer).await.unwrap(), Some(UserType::Developer));
        assert_eq!(repo.get_user_type_by_email(&both).await.unwrap(), Some(UserType::Recruiter));
        assert_eq!(repo.get_user_type_by_email(&email()).await.unwrap(), None);

        // An account's own type wins over any profile.
        repo.create_user(&User::new(&developer, UserType::Admin, Utc::now())).await.unwrap();
        assert_eq!(repo.get_user_type_by_email(&developer).await.unwrap(), Some(UserType::Admin));
    }

    #[tokio::test]
    async fn create_update_and_delete() {
        let Some(repo) = repo().await else { return };
        let email = email();
        let user = User::new(&email, UserType::Developer, Utc::now());

        repo.create_user(&user).await.unwrap();
        assert!(matches!(
            repo.create_user(&User::new(&email, UserType::Admin, Utc::now())).await,
            Err(RepositoryError::Conflict { .. })
        ));

        repo.update_access_token(user.id, "access-1").await.unwrap();
        repo.update_refresh_token(user.id, "refresh-1").await.unwrap();
        let stored = repo.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("access-1"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));

        assert_eq!(repo.delete_user_by_email(&email).await.unwrap(), 1);
        assert_eq!(repo.delete_user_by_email(&email).await.unwrap(), 0);
        assert!(repo.get_user(user.id).await.unwrap().is_none());
    }
}
