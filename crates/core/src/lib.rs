//! Shared primitives for all Rust crates in rolesync.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::ApiToken;

/// Result type used across rolesync crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated against the remote authority.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by remote policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A member identity is declared by more than one local role.
    #[error("member '{member}' is assigned to multiple roles: {}", roles.join(", "))]
    DuplicateMember {
        /// Offending member identity.
        member: String,
        /// Names of every local role declaring the member, sorted.
        roles: Vec<String>,
    },

    /// Transport-level failure such as a refused connection, timeout or DNS error.
    #[error("network error: {0}")]
    Network(String),

    /// Remote API answered with a non-success status.
    #[error("remote api returned status {status}: {message}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Operation was aborted through its cancellation token.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Retryable failures persisted past the retry budget.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Last observed error.
        source: Box<AppError>,
    },

    /// Plan execution stopped after some operations were already applied.
    #[error("partial sync: {completed} operations completed before failure: {source}")]
    PartialSync {
        /// Number of role operations applied before the failure.
        completed: usize,
        /// Error that stopped the run.
        source: Box<AppError>,
    },

    /// Every role operation succeeded but some member operations failed.
    #[error("member sync failed: {failures} member operations failed after {completed} role operations completed")]
    MemberSync {
        /// Number of failed member invitations or assignments.
        failures: usize,
        /// Number of role operations applied.
        completed: usize,
    },

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps a non-success HTTP status and body to an error category.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::Remote { status, message },
        }
    }

    /// Returns whether a retry may succeed where the last attempt failed.
    ///
    /// Network failures and 5xx responses are transient; every other category,
    /// including every 4xx response, fails the same way when repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns whether the error was caused by cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::RetriesExhausted { source, .. } | Self::PartialSync { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}
