//! # Error Taxonomy
//!
//! Every failure that reaches the dispatcher is an [`AppError`]: a tagged
//! [`ErrorKind`] plus the chain of layer tags it was wrapped with on the way
//! up (`[DATA][LookupByID]`, `[SERVICE][LookupByMany]`, `[HANDLER]`).
//!
//! The kind, not the rendered message, decides the response code.

use std::fmt;

use crate::auth::AuthError;
use crate::data::StoreError;

/// Result type used across the service
pub type AppResult<T> = Result<T, AppError>;

/// Externally visible failure classes.
///
/// Variants are declared in ascending precedence so the derived `Ord`
/// matches classification order: when two kinds meet, the greater one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Any failure without a more specific class (envelope code 101)
    NotFound,
    /// Request shape or body rejected (400)
    BadRequest,
    /// Credentials present but malformed (403)
    Forbidden,
    /// Credentials rejected by the auth collaborator (401)
    Unauthorized,
    /// Infrastructure fault (500)
    Internal,
}

impl ErrorKind {
    /// Envelope code for this kind
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::Internal => 500,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 101,
        }
    }

    /// Envelope message for this kind
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Internal => "500 - Internal Server Error",
            ErrorKind::Unauthorized => "401 - Unauthorized",
            ErrorKind::Forbidden => "403 - Forbidden",
            ErrorKind::BadRequest => "400 - Bad Request",
            ErrorKind::NotFound => "101 - Data Not Found",
        }
    }

    /// Pick the winning kind out of several pieces of evidence.
    ///
    /// Returns `None` only when there is no evidence at all.
    pub fn classify(kinds: impl IntoIterator<Item = ErrorKind>) -> Option<ErrorKind> {
        kinds.into_iter().max()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A classified failure with its layer trail
#[derive(Debug, Clone)]
pub struct AppError {
    kind: ErrorKind,
    /// Outermost layer first
    layers: Vec<&'static str>,
    message: String,
}

impl AppError {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            layers: Vec::new(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Prefix a layer tag, keeping the kind
    pub fn wrap(mut self, layer: &'static str) -> Self {
        self.layers.insert(0, layer);
        self
    }

    /// Merge additional evidence; the higher-precedence kind wins
    pub fn escalate(mut self, kind: ErrorKind) -> Self {
        if let Some(winner) = ErrorKind::classify([self.kind, kind]) {
            self.kind = winner;
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The innermost message, without layer tags
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Layer tags, outermost first
    pub fn layers(&self) -> &[&'static str] {
        &self.layers
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for layer in &self.layers {
            write!(f, "{}: ", layer)?;
        }
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        // Database faults carry no marker of their own, so they fall through
        // to the default class along with no-rows.
        let kind = match &err {
            StoreError::MissingId => ErrorKind::BadRequest,
            StoreError::RecordNotFound(_)
            | StoreError::Prepare { .. }
            | StoreError::Sqlite(_)
            | StoreError::Pool(_)
            | StoreError::Task(_) => ErrorKind::NotFound,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        // Whatever the backend said, failing to reach a verdict is our fault.
        Self::internal(err.to_string())
    }
}
