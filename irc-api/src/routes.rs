//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use irc_core::constants::{API_ROUTE, PARAMETER_NATIVE_TOKEN_ID, PARAMETER_NFT_ID};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Metadata
        .route(
            &format!("{API_ROUTE}/nfts/:{PARAMETER_NFT_ID}"),
            get(handlers::get_nft_metadata),
        )
        .route(
            &format!("{API_ROUTE}/tokens/:{PARAMETER_NATIVE_TOKEN_ID}"),
            get(handlers::get_token_metadata),
        )
        .with_state(state)
}
