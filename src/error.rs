//! Store error types.
//!
//! Lookups and writes never fail; the only fallible step is bringing a store up.

use thiserror::Error;

/// Error returned by [`Store::try_init`](crate::Store::try_init).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The maintenance thread could not be started.
    #[error("failed to spawn maintenance thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
