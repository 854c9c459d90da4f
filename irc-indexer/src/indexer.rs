//! Indexer client for resolving output metadata.
//!
//! Resolution takes two calls against the node:
//! 1. `GET /api/indexer/v1/outputs/{nft|foundry}/{id}` for the current output ID
//! 2. `GET /api/core/v2/outputs/{outputId}` for the output itself
//!
//! The metadata feature's `data` field among the output's immutable features
//! holds the document.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use irc_core::constants::{DEFAULT_NODE_URL, METADATA_FEATURE_TYPE};
use irc_core::{
    FetchError, FoundryId, IrcError, MetadataFetcher, NftId, RequestContext, TransientError,
};

/// Indexer client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Base URL of the node REST API
    pub node_url: String,
    /// Request timeout in seconds, applied when the caller sets no deadline
    pub timeout_seconds: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.into(),
            timeout_seconds: 30,
        }
    }
}

impl IndexerConfig {
    /// Creates a configuration for the given node.
    pub fn new(node_url: impl Into<String>) -> Self {
        Self {
            node_url: node_url.into(),
            ..Default::default()
        }
    }
}

/// Client for the node's indexer and output endpoints.
pub struct IndexerClient {
    config: IndexerConfig,
    http_client: reqwest::Client,
}

impl IndexerClient {
    /// Creates a client for the given node.
    pub fn new(node_url: impl Into<String>) -> Result<Self, IrcError> {
        Self::with_config(IndexerConfig::new(node_url))
    }

    /// Creates a client with custom configuration.
    pub fn with_config(config: IndexerConfig) -> Result<Self, IrcError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| IrcError::ConfigError(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Base URL of the node.
    pub fn node_url(&self) -> &str {
        self.config.node_url.trim_end_matches('/')
    }

    /// Fetches the immutable metadata of an NFT.
    #[instrument(skip_all, fields(nft_id = %id))]
    pub async fn nft_metadata(&self, ctx: &RequestContext, id: &NftId) -> Result<Bytes, FetchError> {
        self.immutable_metadata(ctx, "nft", &id.to_hex()).await
    }

    /// Fetches the immutable metadata of a foundry.
    #[instrument(skip_all, fields(foundry_id = %id))]
    pub async fn foundry_metadata(
        &self,
        ctx: &RequestContext,
        id: &FoundryId,
    ) -> Result<Bytes, FetchError> {
        self.immutable_metadata(ctx, "foundry", &id.to_hex()).await
    }

    async fn immutable_metadata(
        &self,
        ctx: &RequestContext,
        kind: &str,
        id: &str,
    ) -> Result<Bytes, FetchError> {
        let index_url = format!("{}/api/indexer/v1/outputs/{}/{}", self.node_url(), kind, id);
        let index: IndexerResponse = self
            .get_json(ctx, &index_url)
            .await?
            .ok_or(FetchError::NotFound)?;

        let output_id = index.items.into_iter().next().ok_or(FetchError::NotFound)?;
        debug!(%output_id, "Found output");

        let output_url = format!("{}/api/core/v2/outputs/{}", self.node_url(), output_id);
        let response: OutputResponse = self
            .get_json(ctx, &output_url)
            .await?
            .ok_or(FetchError::NotFound)?;

        metadata_feature(&response.output.immutable_features)
    }

    /// GETs `url` and decodes the JSON body. `None` means HTTP 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        url: &str,
    ) -> Result<Option<T>, FetchError> {
        ctx.check()?;

        let mut request = self.http_client.get(url);
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let response = request.send().await.map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| FetchError::upstream(format!("malformed response from {url}: {e}"))),
            status => Err(FetchError::upstream(format!("{url} returned HTTP {status}"))),
        }
    }
}

#[async_trait]
impl MetadataFetcher<NftId> for IndexerClient {
    async fn fetch(&self, ctx: &RequestContext, key: &NftId) -> Result<Bytes, FetchError> {
        self.nft_metadata(ctx, key).await
    }
}

#[async_trait]
impl MetadataFetcher<FoundryId> for IndexerClient {
    async fn fetch(&self, ctx: &RequestContext, key: &FoundryId) -> Result<Bytes, FetchError> {
        self.foundry_metadata(ctx, key).await
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Transient(TransientError::DeadlineExceeded)
    } else {
        FetchError::upstream(err.to_string())
    }
}

/// Extracts the metadata feature data from a feature set.
///
/// A set with repeated feature types is malformed. A set without a metadata
/// feature, or one whose data is not hex, carries no usable metadata.
fn metadata_feature(features: &[Feature]) -> Result<Bytes, FetchError> {
    let mut seen = [false; 256];
    for feature in features {
        let slot = &mut seen[usize::from(feature.kind)];
        if *slot {
            return Err(FetchError::Invalid(format!(
                "duplicate feature type {}",
                feature.kind
            )));
        }
        *slot = true;
    }

    let data = features
        .iter()
        .find(|f| f.kind == METADATA_FEATURE_TYPE)
        .and_then(|f| f.data.as_deref())
        .ok_or_else(|| FetchError::Invalid("no metadata feature".into()))?;

    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| FetchError::Invalid(format!("metadata feature is not hex: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexerResponse {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OutputResponse {
    output: Output,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    #[serde(default)]
    immutable_features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OUTPUT_ID: &str = "0x1e857d380f813d8035e487b6dfd2ff4740b6775273be3d0862e1fcdf2e3a0b5d0000";
    const METADATA: &str = r#"{"standard":"IRC27","version":"v1.0","type":"image/png","uri":"ipfs://x","name":"OG"}"#;

    fn nft_id() -> NftId {
        NftId::from_array([7u8; 32])
    }

    fn foundry_id() -> FoundryId {
        FoundryId::from_array([9u8; 38])
    }

    fn metadata_hex() -> String {
        format!("0x{}", hex::encode(METADATA))
    }

    async fn mount_index(server: &MockServer, kind: &str, id: &str, items: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/indexer/v1/outputs/{kind}/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ledgerIndex": 1234,
                "pageSize": 1000,
                "items": items
            })))
            .mount(server)
            .await;
    }

    async fn mount_output(server: &MockServer, features: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/api/core/v2/outputs/{OUTPUT_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "metadata": { "blockId": "0x00", "isSpent": false },
                "output": {
                    "type": 6,
                    "amount": "47800",
                    "immutableFeatures": features
                }
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> IndexerClient {
        IndexerClient::new(server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_nft_metadata_is_decoded() {
        let server = MockServer::start().await;
        mount_index(&server, "nft", &nft_id().to_hex(), json!([OUTPUT_ID])).await;
        mount_output(
            &server,
            json!([
                { "type": 1, "address": { "type": 0, "pubKeyHash": "0x01" } },
                { "type": 2, "data": metadata_hex() }
            ]),
        )
        .await;

        let bytes = client(&server)
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), METADATA.as_bytes());
    }

    #[tokio::test]
    async fn test_foundry_metadata_via_trait() {
        let server = MockServer::start().await;
        mount_index(&server, "foundry", &foundry_id().to_hex(), json!([OUTPUT_ID])).await;
        mount_output(&server, json!([{ "type": 2, "data": metadata_hex() }])).await;

        let fetcher: &dyn MetadataFetcher<FoundryId> = &client(&server);
        let bytes = fetcher
            .fetch(&RequestContext::background(), &foundry_id())
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), METADATA.as_bytes());
    }

    #[tokio::test]
    async fn test_indexer_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client(&server)
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await;
        assert_eq!(result, Err(FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_empty_index_is_not_found() {
        let server = MockServer::start().await;
        mount_index(&server, "nft", &nft_id().to_hex(), json!([])).await;

        let result = client(&server)
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await;
        assert_eq!(result, Err(FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_missing_metadata_feature_is_invalid() {
        let server = MockServer::start().await;
        mount_index(&server, "nft", &nft_id().to_hex(), json!([OUTPUT_ID])).await;
        mount_output(&server, json!([{ "type": 3, "tag": "0x01" }])).await;

        let result = client(&server)
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await;
        assert!(matches!(result, Err(FetchError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_upstream_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server)
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await;
        assert!(matches!(
            result,
            Err(FetchError::Transient(TransientError::Upstream(_)))
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result = client(&server)
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transient() {
        let client = IndexerClient::new("http://127.0.0.1:9").unwrap();
        let result = client
            .nft_metadata(&RequestContext::background(), &nft_id())
            .await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }

    #[tokio::test]
    async fn test_slow_node_hits_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let ctx = RequestContext::with_timeout(Duration::from_millis(100));
        let result = client(&server).nft_metadata(&ctx, &nft_id()).await;
        assert_eq!(
            result,
            Err(FetchError::Transient(TransientError::DeadlineExceeded))
        );
    }

    #[test]
    fn test_duplicate_features_are_invalid() {
        let features = vec![
            Feature { kind: 2, data: Some("0x7b7d".into()) },
            Feature { kind: 2, data: Some("0x7b7d".into()) },
        ];
        assert!(matches!(metadata_feature(&features), Err(FetchError::Invalid(_))));
    }

    #[test]
    fn test_non_hex_data_is_invalid() {
        let features = vec![Feature { kind: 2, data: Some("0xnothex".into()) }];
        assert!(matches!(metadata_feature(&features), Err(FetchError::Invalid(_))));
    }

    #[test]
    fn test_node_url_trailing_slash() {
        let client = IndexerClient::new("http://localhost:14265/").unwrap();
        assert_eq!(client.node_url(), "http://localhost:14265");
    }
}
