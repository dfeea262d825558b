//! # Auth Errors
//!
//! Transport-level failures talking to the auth backend. A *denied* verdict
//! is not an error here; it is an [`Authorization`](super::Authorization)
//! with its status flag set.

use thiserror::Error;

/// Result type for auth client calls
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No base URL configured for the auth backend
    #[error("auth backend is not configured")]
    NotConfigured,

    /// Backend answered with a non-success HTTP status
    #[error("auth backend returned status {0}")]
    UnexpectedStatus(u16),

    /// Connection, timeout or body decoding failure
    #[error("auth backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
}
