//! HTTP handlers of the trigger server

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::HeraldErrorTrait;

use super::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            category: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

// ============================================================================
// Routes
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tasks/main", get(run_main_task))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

/// Run the pipeline once on behalf of the scheduler
async fn run_main_task(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.is_scheduler_request(&headers) {
        tracing::warn!(
            header = %state.config.trigger_header,
            "Rejected trigger from non-scheduler caller"
        );
        return (StatusCode::FORBIDDEN, Json(ErrorResponse::new("Forbidden"))).into_response();
    }

    let Ok(_guard) = state.run_lock.try_lock() else {
        tracing::warn!("Trigger received while a run is in progress");
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new("A run is already in progress")),
        )
            .into_response();
    };

    match state.pipeline.run().await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::success(report))).into_response(),
        Err(e) => {
            tracing::error!(
                error = %e,
                category = e.category().as_str(),
                recoverable = e.is_recoverable(),
                "Run failed"
            );
            let body = ErrorResponse {
                category: Some(e.category().as_str()),
                ..ErrorResponse::new(e.to_string())
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
