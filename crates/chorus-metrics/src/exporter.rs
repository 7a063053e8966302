//! Pull-based exposition endpoint.
//!
//! Serves the registry as Prometheus text format on `GET /metrics`,
//! plus a JSON health route. The listener is bound eagerly so a port
//! conflict surfaces as a construction error rather than a dead scrape
//! target discovered later.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::MetricsError;
use crate::registry::Registry;

/// Content type of the text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// A bound, serving exposition endpoint.
pub struct MetricsExporter {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl MetricsExporter {
    /// Binds `addr` and starts serving the registry.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Bind`] if the address is already in use
    /// or otherwise unbindable.
    pub async fn bind(addr: SocketAddr, registry: Arc<Registry>) -> Result<Self, MetricsError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| MetricsError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| MetricsError::Bind { addr, source })?;

        let shutdown = CancellationToken::new();
        let serve_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app(registry))
                .with_graceful_shutdown(serve_shutdown.cancelled_owned())
                .await
            {
                tracing::error!("metrics exposition server error: {}", e);
            }
        });

        tracing::info!(%local_addr, "metrics exposition listening");

        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    /// The address actually bound (useful when configured with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener and waits for in-flight scrapes to drain.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("metrics exposition task join error: {}", e);
        }
    }
}

/// Builds the exposition router.
pub(crate) fn app(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(registry))
}

async fn metrics_handler(Extension(registry): Extension<Arc<Registry>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        registry.render(),
    )
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
