//! # Auth
//!
//! Narrow capability for verifying request tokens against the external auth
//! backend.

mod client;
mod errors;

pub use client::{AuthClient, AuthStatus, Authorization, HttpAuthClient};
pub use errors::{AuthError, AuthResult};
