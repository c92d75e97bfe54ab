//! Background workers.

pub mod token_purge;

pub use token_purge::{SignOnTokenPurgeWorker, WorkerHandle};
