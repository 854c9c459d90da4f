//! App state: one metadata validator per standard, plus config.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use irc_core::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_METADATA_CACHE_SIZE, DEFAULT_NODE_URL,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, IRC27_SCHEMA_URL, IRC30_SCHEMA_URL, PARAMETER_NATIVE_TOKEN_ID,
    PARAMETER_NFT_ID,
};
use irc_core::{FoundryId, IrcError, MetadataFetcher, NftId, RequestContext, Result};
use irc_indexer::{IndexerClient, IndexerConfig};
use irc_metadata::MetadataValidator;
use irc_schema::SchemaValidator;

/// Service configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    /// Address the HTTP server listens on
    pub bind_address: String,
    /// Address announced to clients, if different from the bind address
    pub advertise_address: Option<String>,
    /// Cached outcomes per metadata standard
    pub metadata_cache_size: usize,
    /// Log every request and response at INFO instead of DEBUG
    pub debug_request_logger: bool,
    /// Node REST API used for indexer queries
    pub node_url: String,
    /// Time budget of one metadata request, in seconds
    pub request_timeout_seconds: u64,
    /// Location of the IRC27 schema
    pub irc27_schema: String,
    /// Location of the IRC30 schema
    pub irc30_schema: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.into(),
            advertise_address: None,
            metadata_cache_size: DEFAULT_METADATA_CACHE_SIZE,
            debug_request_logger: false,
            node_url: DEFAULT_NODE_URL.into(),
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            irc27_schema: IRC27_SCHEMA_URL.into(),
            irc30_schema: IRC30_SCHEMA_URL.into(),
        }
    }
}

impl ApiConfig {
    /// Reads the configuration from `IRC_*` environment variables, loading a
    /// `.env` file first if present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            bind_address: lookup("IRC_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            advertise_address: lookup("IRC_ADVERTISE_ADDRESS").filter(|v| !v.is_empty()),
            metadata_cache_size: match lookup("IRC_METADATA_CACHE_SIZE") {
                Some(v) => parse_number("IRC_METADATA_CACHE_SIZE", &v)?,
                None => defaults.metadata_cache_size,
            },
            debug_request_logger: lookup("IRC_DEBUG_REQUEST_LOGGER")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.debug_request_logger),
            node_url: lookup("IRC_NODE_URL").unwrap_or(defaults.node_url),
            request_timeout_seconds: match lookup("IRC_REQUEST_TIMEOUT") {
                Some(v) => parse_number("IRC_REQUEST_TIMEOUT", &v)?,
                None => defaults.request_timeout_seconds,
            },
            irc27_schema: lookup("IRC27_SCHEMA").unwrap_or(defaults.irc27_schema),
            irc30_schema: lookup("IRC30_SCHEMA").unwrap_or(defaults.irc30_schema),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.metadata_cache_size == 0 {
            return Err(IrcError::ConfigError(
                "metadata cache size must be positive".into(),
            ));
        }
        if self.request_timeout_seconds == 0 {
            return Err(IrcError::ConfigError(
                "request timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The address announced to clients.
    pub fn advertised_address(&self) -> &str {
        self.advertise_address
            .as_deref()
            .unwrap_or(&self.bind_address)
    }

    /// Time budget of one metadata request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IrcError::ConfigError(format!("{name} must be a number, got '{value}'")))
}

/// Shared state of all request handlers.
pub struct AppState {
    /// NFT (IRC27) metadata
    pub irc27: MetadataValidator<NftId>,
    /// Native token (IRC30) metadata
    pub irc30: MetadataValidator<FoundryId>,
    /// Address announced to clients
    pub advertised_address: String,
    /// Time budget of one metadata request
    pub request_timeout: Duration,
}

impl AppState {
    /// Creates state around ready-made validators, with default timing.
    pub fn new(irc27: MetadataValidator<NftId>, irc30: MetadataValidator<FoundryId>) -> Self {
        Self {
            irc27,
            irc30,
            advertised_address: DEFAULT_BIND_ADDRESS.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }

    /// Compiles both schemas and wires the validators to the node indexer.
    ///
    /// # Errors
    ///
    /// Fails if either schema cannot be loaded or compiled; the service must
    /// not start without them.
    pub async fn bootstrap(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        let (irc27_schema, irc30_schema) = futures::try_join!(
            SchemaValidator::compile(&config.irc27_schema),
            SchemaValidator::compile(&config.irc30_schema),
        )?;

        let indexer = Arc::new(IndexerClient::with_config(IndexerConfig {
            node_url: config.node_url.clone(),
            timeout_seconds: config.request_timeout_seconds,
        })?);
        let nft_source: Arc<dyn MetadataFetcher<NftId>> = indexer.clone();
        let token_source: Arc<dyn MetadataFetcher<FoundryId>> = indexer;

        let irc27 = MetadataValidator::new(
            "IRC27",
            irc27_schema,
            config.metadata_cache_size,
            |raw: &str| NftId::parse_param(PARAMETER_NFT_ID, raw),
            nft_source,
        )?;

        let irc30 = MetadataValidator::new(
            "IRC30",
            irc30_schema,
            config.metadata_cache_size,
            |raw: &str| FoundryId::parse_param(PARAMETER_NATIVE_TOKEN_ID, raw),
            token_source,
        )?;

        info!(
            node_url = %config.node_url,
            cache_size = config.metadata_cache_size,
            "Metadata validators ready"
        );

        Ok(Self::new(irc27, irc30)
            .with_advertised_address(config.advertised_address())
            .with_request_timeout(config.request_timeout()))
    }

    /// Sets the address announced to clients.
    pub fn with_advertised_address(mut self, address: impl Into<String>) -> Self {
        self.advertised_address = address.into();
        self
    }

    /// Sets the time budget of one metadata request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// A fresh context for one request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
    }
}
