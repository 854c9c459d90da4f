//! Error types for the IRC metadata service.
//!
//! Upstream failures are classified where they happen: a fetcher returns a
//! [`FetchError`] that already says whether the key does not exist, carries
//! non-conforming data, or hit a temporary problem. Only the first two are
//! ever cached.

use thiserror::Error;

/// Result type alias using `IrcError`.
pub type Result<T> = std::result::Result<T, IrcError>;

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A request key could not be extracted from its path parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid parameter '{name}': {reason}")]
pub struct ParameterError {
    /// Name of the offending parameter.
    pub name: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl ParameterError {
    /// Creates a new parameter error.
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// A failure that may resolve on its own. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientError {
    /// The upstream source was unreachable or answered unexpectedly.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The caller abandoned the request.
    #[error("request cancelled")]
    Cancelled,

    /// The request ran out of time.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Outcome of a failed metadata fetch, classified by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source authoritatively reported that the key does not exist.
    #[error("metadata not found")]
    NotFound,

    /// The entity exists but carries no usable metadata.
    #[error("invalid metadata: {0}")]
    Invalid(String),

    /// A temporary failure; the next call may succeed.
    #[error(transparent)]
    Transient(#[from] TransientError),
}

impl FetchError {
    /// Shorthand for an upstream transient failure.
    pub fn upstream(reason: impl Into<String>) -> Self {
        FetchError::Transient(TransientError::Upstream(reason.into()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Main error type for service setup and request handling.
#[derive(Debug, Error)]
pub enum IrcError {
    /// Request parameter rejected.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Temporary upstream failure.
    #[error(transparent)]
    Transient(#[from] TransientError),

    /// A schema could not be loaded or compiled.
    #[error("schema '{location}' unusable: {reason}")]
    Schema {
        /// Where the schema was loaded from.
        location: String,
        /// What went wrong.
        reason: String,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
