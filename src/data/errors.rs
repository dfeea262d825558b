//! # Data Layer Errors

use thiserror::Error;

/// Result type for data layer internals
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by the record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// A registered statement did not compile at startup
    #[error("failed to prepare statement {key}: {source}")]
    Prepare {
        key: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Single-row lookup matched nothing
    #[error("no rows for user_id {0}")]
    RecordNotFound(i64),

    /// Update input without an id
    #[error("user_id is required")]
    MissingId,

    /// Any other database failure
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No pooled connection could be handed out
    #[error("connection pool: {0}")]
    Pool(String),

    /// The blocking task running a statement panicked or was cancelled
    #[error("statement task failed: {0}")]
    Task(String),
}
