//! HTTP server setup and device listener wiring.
//!
//! # Responsibilities
//! - Create Axum Router with all bridge handlers
//! - Wire up middleware (request id, tracing, timeout)
//! - Run the device accept loop next to the HTTP server
//! - Coordinate graceful shutdown of both sides

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::{BridgeConfig, QueryConfig};
use crate::device::{serve_devices, SessionConfig};
use crate::http::handlers;
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener};
use crate::paraminfo::ParameterSource;
use crate::registry::Registry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub source: Arc<dyn ParameterSource>,
    pub query: QueryConfig,
}

/// The bridge: HTTP control surface plus device listener.
pub struct BridgeServer {
    config: BridgeConfig,
    registry: Registry,
    tracker: ConnectionTracker,
    router: Router,
}

impl BridgeServer {
    /// Create a new server with the given configuration and parameter source.
    pub fn new(config: BridgeConfig, source: Arc<dyn ParameterSource>) -> Self {
        let registry = Registry::new(Arc::clone(&source), config.protocol.history_capacity);
        let state = AppState {
            registry: registry.clone(),
            source,
            query: config.query.clone(),
        };
        let router = build_router(&config, state);

        Self {
            config,
            registry,
            tracker: ConnectionTracker::new(),
            router,
        }
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// The HTTP router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Serve HTTP and device connections until `shutdown` fires.
    pub async fn run(
        self,
        http_listener: TcpListener,
        device_listener: Listener,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            http_address = %http_listener.local_addr()?,
            device_address = %device_listener.local_addr()?,
            "Bridge starting"
        );

        let devices = tokio::spawn(serve_devices(
            device_listener,
            self.registry.clone(),
            self.tracker.clone(),
            SessionConfig::from(&self.config),
            shutdown.clone(),
        ));

        let mut stop = shutdown.subscribe();
        axum::serve(http_listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;
        tracing::info!("HTTP server stopped");

        if let Err(e) = devices.await {
            tracing::error!(error = %e, "Device listener task failed");
        }

        let deadline = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        if !self.tracker.wait_for_drain(deadline).await {
            tracing::warn!(
                remaining_sessions = self.tracker.active_count(),
                registered = self.registry.len(),
                "Device sessions did not drain before deadline"
            );
        }
        Ok(())
    }
}

/// Assigns a UUID v4 `x-request-id` to requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &BridgeConfig, state: AppState) -> Router {
    Router::new()
        .route("/controls", get(handlers::controls))
        .route("/paraminfo", get(handlers::paraminfo))
        .route(
            "/madigan-parameter",
            get(handlers::query_parameter).patch(handlers::set_parameter),
        )
        .route("/madigan-state", get(handlers::state))
        .route("/madigan-send", get(handlers::send))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.http.request_timeout_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(RequestUuid))
}
