//! Storage abstraction for lockbox.
//!
//! Backend crates (lockbox-store-postgres, lockbox-store-sqlite) implement the
//! [`Store`] trait so the server never depends on a specific database engine
//! or schema details. Every entry operation is scoped by the owning user; a
//! backend must never return a row whose owner differs from the one given.

use thiserror::Error;

pub mod store;
pub mod types;

pub use store::Store;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// Optimistic update lost: the row exists but at a different version.
    #[error("version mismatch")]
    VersionMismatch,
    #[error("backend error: {0}")]
    Backend(String),
}
