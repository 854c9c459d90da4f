//! # IRC Metadata API Server
//!
//! REST API serving IRC27 (NFT) and IRC30 (native token) metadata that has
//! been checked against its schema.
//!
//! ## Endpoints
//!
//! - `GET /api/irc-metadata/v1/nfts/:nftID` - NFT metadata
//! - `GET /api/irc-metadata/v1/tokens/:tokenID` - Native token metadata
//! - `GET /health` - Liveness and cache statistics
//!
//! Valid metadata is returned exactly as stored on the ledger. Unknown keys
//! answer `404`, metadata that fails its schema answers `406`, malformed
//! keys answer `400`, and temporary upstream problems answer `5xx`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use irc_api::{ApiConfig, ApiServer, AppState};
//!
//! let config = ApiConfig::from_env()?;
//! let state = AppState::bootstrap(&config).await?;
//! let server = ApiServer::new(state).with_debug_request_logger(config.debug_request_logger);
//! server.run(config.bind_address.as_str()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use handlers::{handle_request, METADATA_CONTENT_TYPE};
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

/// API server for IRC metadata.
pub struct ApiServer {
    state: Arc<AppState>,
    debug_request_logger: bool,
}

impl ApiServer {
    /// Creates a new API server around prepared state.
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            debug_request_logger: false,
        }
    }

    /// Logs every request and response at INFO instead of DEBUG.
    pub fn with_debug_request_logger(mut self, enabled: bool) -> Self {
        self.debug_request_logger = enabled;
        self
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let level = if self.debug_request_logger {
            Level::INFO
        } else {
            Level::DEBUG
        };
        let trace = TraceLayer::new_for_http()
            .on_request(DefaultOnRequest::new().level(level))
            .on_response(DefaultOnResponse::new().level(level));

        create_router(self.state.clone()).layer(cors).layer(trace)
    }

    /// Runs the server on the given address until the process exits.
    pub async fn run(self, addr: impl ToSocketAddrs) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;

        info!("IRC metadata API listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router()).await
    }

    /// Binds `addr` and serves in the background until [`RunningServer::stop`].
    pub async fn start(self, addr: impl ToSocketAddrs) -> io::Result<RunningServer> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("IRC metadata API listening on {}", local_addr);

        Ok(RunningServer {
            local_addr,
            shutdown_tx,
            task,
        })
    }
}

/// Handle of a server started with [`ApiServer::start`].
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits up to `timeout` for in-flight
    /// requests to drain. Requests still running after that are dropped.
    pub async fn stop(self, timeout: Duration) -> io::Result<()> {
        info!("Stopping IRC metadata API");
        let _ = self.shutdown_tx.send(());

        let mut task = self.task;
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(io::Error::new(io::ErrorKind::Other, join_err)),
            Err(_) => {
                warn!(?timeout, "Shutdown timed out, aborting open connections");
                task.abort();
                Ok(())
            }
        }
    }
}
