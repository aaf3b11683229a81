//! Error types for `scribe-core`.
//!
//! Service operations return [`CoreResult<T>`], an alias for
//! `Result<T, CoreError>`. The access control chain and the rate limiter
//! produce the smaller, closed [`AccessError`] set, which the web layer maps
//! to status codes in exactly one place.

use std::fmt;

use crate::model::validate::FieldError;
use crate::store::StoreError;

/// Why an authenticated, active caller was still refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The identity exists but has been deactivated.
    Inactive,
    /// The route requires a verified identity.
    Unverified,
    /// The route requires a superuser.
    NotSuperuser,
    /// The caller neither owns the target nor is a superuser.
    /// Carries the refused action, e.g. `"modify this post"`.
    NotOwner(&'static str),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Inactive => f.write_str("Inactive user"),
            DenialReason::Unverified => f.write_str("User not verified"),
            DenialReason::NotSuperuser => f.write_str("Not enough permissions"),
            DenialReason::NotOwner(action) => write!(f, "Not enough permissions to {action}"),
        }
    }
}

/// Terminal outcomes of the request admission pipeline.
///
/// Authentication failures deliberately carry no detail: a missing header,
/// a forged token, an expired token and a dangling subject all look the same
/// to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Could not validate credentials")]
    AuthenticationFailed,

    #[error("{0}")]
    AuthorizationDenied(DenialReason),

    #[error("Maximum {limit} requests per minute allowed")]
    RateLimitExceeded { limit: u32, retry_after: u64 },

    /// Internal only. Never rendered to the caller verbatim.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Unified error type for service operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The named entity does not exist (`"User"`, `"Post"`).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness rule was violated; the message is caller-facing.
    #[error("{0}")]
    Conflict(String),

    /// One or more input fields failed validation.
    #[error("validation failed: {}", format_fields(.0))]
    Validation(Vec<FieldError>),

    /// The request is well-formed but cannot be honoured.
    #[error("{0}")]
    BadRequest(String),

    /// Login with an unknown identifier or a wrong password.
    #[error("Incorrect username or password")]
    InvalidLogin,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A configuration value is missing or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Hashing, signing or task-join failures.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout `scribe-core`.
pub type CoreResult<T> = Result<T, CoreError>;
