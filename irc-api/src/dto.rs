//! DTOs for API responses.

use serde::Serialize;

use irc_cache::CacheStats;

/// Response for health check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Status
    pub status: String,
    /// Version
    pub version: String,
    /// Address announced to clients
    pub advertised_address: String,
    /// Per-standard cache statistics
    pub caches: CachesDto,
}

/// Cache statistics of both metadata standards.
#[derive(Debug, Serialize)]
pub struct CachesDto {
    /// NFT metadata cache
    pub irc27: CacheStats,
    /// Native token metadata cache
    pub irc30: CacheStats,
}
