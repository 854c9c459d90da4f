//! API request handlers.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use irc_core::{CachedOutcome, RequestContext};
use irc_metadata::MetadataValidator;

use crate::dto::{CachesDto, HealthResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Content type of served metadata.
pub const METADATA_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

// ═══════════════════════════════════════════════════════════════════════════
// Metadata Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// GET /api/irc-metadata/v1/nfts/:nftID
pub async fn get_nft_metadata(
    State(state): State<Arc<AppState>>,
    nft_id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(nft_id) = nft_id?;
    let ctx = state.request_context();
    handle_request(&state.irc27, &ctx, &nft_id).await
}

/// GET /api/irc-metadata/v1/tokens/:tokenID
pub async fn get_token_metadata(
    State(state): State<Arc<AppState>>,
    token_id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(token_id) = token_id?;
    let ctx = state.request_context();
    handle_request(&state.irc30, &ctx, &token_id).await
}

/// Parses the key, resolves it and renders the outcome.
///
/// Valid metadata is returned byte-for-byte as fetched. Unparseable keys
/// never reach the cache.
pub async fn handle_request<K>(
    validator: &MetadataValidator<K>,
    ctx: &RequestContext,
    raw_key: &str,
) -> Result<Response, ApiError>
where
    K: Hash + Eq + Clone + fmt::Display + Send + Sync + 'static,
{
    let key = validator.parse_key(raw_key)?;

    match validator.resolve(ctx, key).await? {
        CachedOutcome::Valid(payload) => {
            Ok(([(header::CONTENT_TYPE, METADATA_CONTENT_TYPE)], payload).into_response())
        }
        CachedOutcome::NotFound => Err(ApiError::not_found(format!(
            "{} metadata not found",
            validator.name()
        ))),
        CachedOutcome::Invalid => Err(ApiError::not_acceptable(format!(
            "{} metadata does not match the schema",
            validator.name()
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Health
// ═══════════════════════════════════════════════════════════════════════════

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        advertised_address: state.advertised_address.clone(),
        caches: CachesDto {
            irc27: state.irc27.cache_stats(),
            irc30: state.irc30.cache_stats(),
        },
    })
}
