//! Trigger server
//!
//! Exposes the pipeline to an external scheduler over HTTP. Only requests
//! carrying the configured scheduler header start a run, and at most one
//! run executes at a time.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use axum::Router;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::pipeline::Pipeline;

pub use api::{create_router, ApiResponse, ErrorResponse, HealthResponse};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Pipeline executed per trigger
    pub pipeline: Arc<Pipeline>,

    /// Held for the duration of a run
    pub run_lock: Arc<Mutex<()>>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(pipeline: Pipeline, config: ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            run_lock: Arc::new(Mutex::new(())),
            start_time: Instant::now(),
            config,
        }
    }

    /// Whether the request comes from the scheduler
    pub fn is_scheduler_request(&self, headers: &HeaderMap) -> bool {
        headers
            .get(self.config.trigger_header.as_str())
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == self.config.trigger_value)
    }
}

// ============================================================================
// Trigger Server
// ============================================================================

pub struct TriggerServer {
    config: ServerConfig,
    state: AppState,
}

impl TriggerServer {
    pub fn new(pipeline: Pipeline, config: ServerConfig) -> Result<Self, ServerError> {
        if config.trigger_header.trim().is_empty() {
            return Err(ServerError::ConfigError(
                "trigger header must not be empty".to_string(),
            ));
        }
        if axum::http::HeaderName::from_bytes(config.trigger_header.as_bytes()).is_err() {
            return Err(ServerError::ConfigError(format!(
                "invalid trigger header name: {}",
                config.trigger_header
            )));
        }

        let state = AppState::new(pipeline, config.clone());
        Ok(Self { config, state })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = create_router(self.state.clone());

        if self.config.enable_request_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.config.bind_address
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.config.bind_address;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        tracing::info!(
            address = %addr,
            trigger_header = %self.config.trigger_header,
            "Trigger server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Trigger server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Server Errors
// ============================================================================

#[derive(Debug, Clone)]
pub enum ServerError {
    /// Configuration error
    ConfigError(String),

    /// Failed to bind to address
    BindError(String),

    /// Server error
    ServeError(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::BindError(msg) => write!(f, "Failed to bind: {}", msg),
            Self::ServeError(msg) => write!(f, "Server error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}
