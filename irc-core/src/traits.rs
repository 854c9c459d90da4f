//! Common traits for the IRC metadata service.
//!
//! These traits define the seams where upstream sources are plugged in,
//! enabling the node-backed implementation in production and scripted
//! sources in tests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;
use crate::types::RequestContext;

/// Source of raw metadata bytes for keys of type `K`.
///
/// Implementations classify every failure themselves:
/// - [`FetchError::NotFound`] when the source says the key does not exist
/// - [`FetchError::Invalid`] when the entity exists but carries no usable metadata
/// - [`FetchError::Transient`] for anything that might succeed on a later call
///
/// Callers never inspect the returned bytes to guess an error kind.
#[async_trait]
pub trait MetadataFetcher<K>: Send + Sync
where
    K: Send + Sync,
{
    /// Fetches the raw metadata bytes associated with `key`.
    ///
    /// Implementations should honor the time budget of `ctx`; the caller
    /// additionally races the returned future against cancellation.
    async fn fetch(&self, ctx: &RequestContext, key: &K) -> Result<Bytes, FetchError>;
}
