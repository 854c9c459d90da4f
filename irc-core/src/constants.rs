//! Service constants.
//!
//! Schema locations follow TIP-27 (NFT metadata) and TIP-30 (native token
//! metadata). Identifier sizes follow the Stardust output model.

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMAS
// ═══════════════════════════════════════════════════════════════════════════════

/// Location of the IRC27 (NFT) metadata schema.
pub const IRC27_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/iotaledger/tips/main/tips/TIP-0027/irc27.schema.json";

/// Location of the IRC30 (native token) metadata schema.
pub const IRC30_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/iotaledger/tips/main/tips/TIP-0030/irc30.schema.json";

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an NFT ID in bytes (BLAKE2b-256 of the minting output ID).
pub const NFT_ID_LENGTH: usize = 32;

/// Size of a foundry ID in bytes (alias address + serial number + token scheme).
pub const FOUNDRY_ID_LENGTH: usize = 38;

/// Feature type tag of the metadata feature inside an output.
pub const METADATA_FEATURE_TYPE: u8 = 2;

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP SURFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Root of the public API.
pub const API_ROUTE: &str = "/api/irc-metadata/v1";

/// Path parameter naming an NFT.
pub const PARAMETER_NFT_ID: &str = "nftID";

/// Path parameter naming a native token (foundry).
pub const PARAMETER_NATIVE_TOKEN_ID: &str = "tokenID";

// ═══════════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default bind address of the HTTP server.
pub const DEFAULT_BIND_ADDRESS: &str = "localhost:9687";

/// Default number of cached outcomes per metadata standard.
pub const DEFAULT_METADATA_CACHE_SIZE: usize = 1000;

/// Default node REST endpoint used for indexer queries.
pub const DEFAULT_NODE_URL: &str = "http://localhost:14265";

/// Default time budget of a single metadata request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Time allowed for in-flight requests to drain on shutdown, in seconds.
pub const SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;
