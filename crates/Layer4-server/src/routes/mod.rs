//! HTTP and WebSocket routes

mod api;
mod ws;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ralph_foundation::Error;
use ralph_task::Engine;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// A client that cannot take a frame within this time is dropped
    pub write_timeout: Duration,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            write_timeout: Duration::from_secs(10),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/projects", get(api::list_projects))
        .route("/api/projects/:name/status", get(api::status))
        .route("/api/projects/:name/launch", post(api::launch))
        .route("/api/projects/:name/stop", post(api::stop))
        .route("/api/projects/:name/pause", post(api::pause))
        .route("/api/projects/:name/resume", post(api::resume))
        .route("/api/projects/:name/logs", get(api::logs))
        .route("/api/projects/:name/logs/clear", post(api::clear_logs))
        .route("/api/projects/:name/log-files", get(api::log_files))
        .route("/api/projects/:name/log-files/read", get(api::read_log_file))
        .route("/api/system/metrics", get(api::metrics))
        .route("/api/system/metrics/history", get(api::metrics_history))
        .route("/ws/metrics", get(ws::metrics))
        .route("/ws/logs/:project", get(ws::logs))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// Engine error rendered as `{ "success": false, "message": ... }`
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            Error::AlreadyRunning(_) => StatusCode::CONFLICT,
            Error::NotRunning(_)
            | Error::NotPaused(_)
            | Error::InvalidInput(_)
            | Error::InvalidChannel(_) => StatusCode::BAD_REQUEST,
            Error::ProjectNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotSupported(_) => StatusCode::NOT_IMPLEMENTED,
            Error::SubscriberOverloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.0.is_user_facing() {
            self.0.to_string()
        } else {
            tracing::warn!("Request failed: {}", self.0);
            "Internal server error".to_string()
        };
        let body = Json(json!({ "success": false, "message": message }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::AlreadyRunning("p".into()), StatusCode::CONFLICT),
            (Error::NotRunning("p".into()), StatusCode::BAD_REQUEST),
            (Error::NotPaused("p".into()), StatusCode::BAD_REQUEST),
            (Error::ProjectNotFound("p".into()), StatusCode::NOT_FOUND),
            (Error::NotSupported("SIGSTOP".into()), StatusCode::NOT_IMPLEMENTED),
            (Error::spawn_failed("p", "no such file"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError(error).status_code(), expected);
        }
    }

    async fn body(error: Error) -> (StatusCode, serde_json::Value) {
        let response = ApiError(error).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_body() {
        let (status, json) = body(Error::AlreadyRunning("demo".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], Error::AlreadyRunning("demo".into()).to_string());
    }

    #[tokio::test]
    async fn test_internal_error_message_hidden() {
        let (status, json) = body(Error::Internal("lock poisoned at /srv/x".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
    }
}
