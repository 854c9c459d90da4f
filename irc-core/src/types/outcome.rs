//! Classified result of resolving a metadata key.

use bytes::Bytes;

/// The unit of cache storage.
///
/// Once stored an outcome is never mutated; recomputing a key replaces the
/// whole value. Only [`CachedOutcome::Valid`] carries a payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CachedOutcome {
    /// Schema-conformant document, exactly as fetched.
    Valid(Bytes),
    /// The source reported that the key does not exist.
    NotFound,
    /// The fetched bytes were not JSON or did not match the schema.
    Invalid,
}

impl CachedOutcome {
    /// Returns the payload of a valid outcome.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            CachedOutcome::Valid(bytes) => Some(bytes),
            CachedOutcome::NotFound | CachedOutcome::Invalid => None,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CachedOutcome::Valid(_) => "valid",
            CachedOutcome::NotFound => "not_found",
            CachedOutcome::Invalid => "invalid",
        }
    }
}
