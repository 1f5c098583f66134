//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the edge handler as catch-all
//! - Wire up middleware (tracing)
//! - Hold the current snapshot and swap it on reload
//! - Serve until shutdown, draining in-flight requests
//!
//! # Design Decisions
//! - Each request loads the snapshot once and keeps it to completion
//! - A reload that fails to build leaves the current snapshot in place
//! - The clock is injected so expiry can be tested deterministically

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::dispatcher::{dispatch, Disposition, EdgeState, ProxyError};
use crate::http::request::EdgeRequestId;
use crate::http::response::render;
use crate::lifecycle::startup::{build_edge_state, StartupError};
use crate::observability::metrics;
use crate::security::{Clock, SystemClock};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<ArcSwap<EdgeState>>,
    pub clock: Arc<dyn Clock>,
}

/// HTTP front door of the edge.
pub struct HttpServer {
    router: Router,
    snapshot: Arc<ArcSwap<EdgeState>>,
}

impl HttpServer {
    /// Build the server; fails on invalid config or unreadable keys.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the server with an explicit time source.
    pub fn with_clock(config: ProxyConfig, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        let snapshot = Arc::new(ArcSwap::from_pointee(build_edge_state(&config)?));
        let state = AppState {
            snapshot: snapshot.clone(),
            clock,
        };
        Ok(Self {
            router: Self::build_router(state),
            snapshot,
        })
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(edge_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Snapshot currently serving requests.
    pub fn snapshot(&self) -> Arc<EdgeState> {
        self.snapshot.load_full()
    }

    /// Build and publish a snapshot for `config`. On error nothing changes.
    pub fn reload(&self, config: &ProxyConfig) -> Result<(), StartupError> {
        apply_reload(&self.snapshot, config)
    }

    /// Serve on `listener` until `shutdown` fires, applying configs from `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let snapshot = self.snapshot.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = apply_reload(&snapshot, &config) {
                    tracing::error!(error = %e, "Reload rejected, keeping current snapshot");
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

fn apply_reload(snapshot: &ArcSwap<EdgeState>, config: &ProxyConfig) -> Result<(), StartupError> {
    let state = build_edge_state(config)?;
    snapshot.store(Arc::new(state));
    tracing::info!(origins = config.origins.len(), "Snapshot swapped");
    Ok(())
}

/// Catch-all handler: dispatch, render, record.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response<Body> {
    let start = Instant::now();
    let snapshot = state.snapshot.load_full();
    let request_id = EdgeRequestId::generate();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Request received");

    let (disposition, decision) = dispatch(&snapshot, request, &request_id, state.clock.now()).await;
    let status = disposition.status();
    let origin = decision.origin_name().to_string();

    if let Some(outcome) = decision.signature {
        metrics::record_signature_outcome(outcome);
    }
    match &disposition {
        Disposition::Rejected(err @ (ProxyError::UpstreamUnavailable(_) | ProxyError::UpstreamTimeout(_))) => {
            let kind = match err {
                ProxyError::UpstreamTimeout(_) => "timeout",
                _ => "unavailable",
            };
            metrics::record_upstream_error(kind, &origin);
            tracing::warn!(request_id = %request_id, origin = %origin, error = %err, "Upstream failure");
        }
        Disposition::Rejected(err) => {
            tracing::info!(
                request_id = %request_id,
                path = %path,
                origin = %origin,
                code = err.code(),
                outcome = decision.signature.map(|o| o.as_str()).unwrap_or("-"),
                "Request rejected"
            );
        }
        _ => {}
    }

    let response = render(disposition, &decision, &request_id);

    metrics::record_request(&method, status.as_u16(), &origin, start);
    tracing::debug!(
        request_id = %request_id,
        status = status.as_u16(),
        origin = %origin,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
    response
}
