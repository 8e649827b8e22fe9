//! # AppError
//!
//! Centralized error handling for the Rusty-Wiki ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all rw-core and rw-services operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input (e.g. empty title, invalid reference link)
    #[error("validation error: {0}")]
    ValidationFailed(String),

    /// Resource not found (e.g. Article, TalkPage, Topic)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// The actor may not perform this action on this resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No valid session accompanied a request that needs one
    #[error("authentication required")]
    Unauthenticated,

    /// Unknown user, wrong password, locked or banned account. Deliberately
    /// indistinguishable.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The caller named a portal that does not exist
    #[error("portal not found with ID {0}")]
    PortalNotFound(Uuid),

    /// Uniqueness violation (e.g. username or email already taken)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A cross-entity invariant was found broken, or a compensating step
    /// failed and left one broken
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Infrastructure failure (e.g. DB down)
    #[error("store error: {0}")]
    Store(anyhow::Error),

    /// The request deadline elapsed
    #[error("operation timed out")]
    Timeout,

    /// Rate limit exceeded
    #[error("too many requests: {0}")]
    RateLimited(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AppError::NotFound(kind, id.to_string())
    }

    /// Stable machine-readable code, safe to expose to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationFailed(_) => "VALIDATION_FAILED",
            AppError::NotFound(..) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::PortalNotFound(_) => "PORTAL_NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Timeout => "TIMEOUT",
            AppError::RateLimited(_) => "RATE_LIMITED",
        }
    }

    /// Server-side failures whose detail must not reach the client.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Store(_) | AppError::IntegrityViolation(_) | AppError::Timeout
        )
    }
}

/// Raised by store plugins, wrapped in `anyhow::Error`, when a unique index
/// rejects a write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("duplicate key on {field}")]
pub struct DuplicateKey {
    pub field: &'static str,
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<DuplicateKey>() {
            Some(dup) => AppError::Conflict(format!("{} already exists", dup.field)),
            None => AppError::Store(err),
        }
    }
}

/// A specialized Result type for Rusty-Wiki logic.
pub type Result<T> = std::result::Result<T, AppError>;
