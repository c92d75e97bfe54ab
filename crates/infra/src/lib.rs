//! Infrastructure layer: Postgres access, repositories, background workers.

pub mod db;
pub mod users;
pub mod workers;

pub use users::{InMemoryUserRepository, PostgresUserRepository, RepositoryError, UserRepository};
