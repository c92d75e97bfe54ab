//! User accounts and sign-on tokens.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryUserRepository;
pub use postgres::PostgresUserRepository;
pub use r#trait::{RepositoryError, UserRepository};
