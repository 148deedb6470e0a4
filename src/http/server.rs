//! HTTP server for the reference gateway.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::routing::{any, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use super::middleware::{MiddlewareConfig, RateLimitLayer};
use crate::error::{BreakwaterError, Result};
use crate::ratelimit::LimiterRegistry;

/// HTTP server exposing a rate-limited API surface.
///
/// Health and status endpoints sit outside the limiter; everything
/// under `/api/` goes through it.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The limiter registry shared with the sweeper
    registry: Arc<LimiterRegistry>,
    /// Middleware configuration
    middleware: MiddlewareConfig,
}

impl HttpServer {
    /// Create a new HTTP server with default middleware configuration.
    pub fn new(addr: SocketAddr, registry: Arc<LimiterRegistry>) -> Self {
        Self {
            addr,
            registry,
            middleware: MiddlewareConfig::default(),
        }
    }

    /// Create a new HTTP server with an explicit middleware configuration.
    pub fn with_middleware(
        addr: SocketAddr,
        registry: Arc<LimiterRegistry>,
        middleware: MiddlewareConfig,
    ) -> Self {
        Self {
            addr,
            registry,
            middleware,
        }
    }

    fn router(&self) -> Router {
        let api = Router::new().route("/api/{*rest}", any(echo)).layer(
            RateLimitLayer::with_config(Arc::clone(&self.registry), self.middleware.clone()),
        );

        Router::new()
            .route("/health", get(health))
            .route("/status", get(status))
            .with_state(Arc::clone(&self.registry))
            .merge(api)
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        // ConnectInfo feeds the key generator's last-resort IP source.
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            BreakwaterError::Io(e)
        })
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Tracked key counts per preset.
#[derive(Debug, Serialize)]
struct StatusBody {
    tracked_keys: HashMap<&'static str, usize>,
}

async fn status(State(registry): State<Arc<LimiterRegistry>>) -> Json<StatusBody> {
    let tracked_keys = registry
        .store_counts()
        .into_iter()
        .map(|(preset, count)| (preset.as_str(), count))
        .collect();
    Json(StatusBody { tracked_keys })
}

async fn echo(uri: Uri) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "path": uri.path(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
