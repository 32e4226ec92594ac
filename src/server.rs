//! HTTP control surface for a running sentry.
//!
//! This module provides an HTTP server that:
//! - Reports the current snapshot and session counters
//! - Serves the captured photo and its processed variant
//! - Forwards operator commands (reset, chat, camera retry)
//!
//! # Architecture
//!
//! ```text
//! Browser / kiosk UI ──→ GET /status ──→ SentryHandle ──watch──→ Sentry
//!                    ──→ POST /reset ──→ SentryHandle ──mpsc───→ Sentry
//! ```

use crate::core::CapturedImage;
use crate::sentry::{Command, SentryHandle, SentrySnapshot};
use crate::transparency::TransparencyStats;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Response to an accepted command
#[derive(Serialize)]
pub struct CommandResponse {
    pub status: String,
    pub command: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status
async fn status(State(handle): State<Arc<SentryHandle>>) -> Json<SentrySnapshot> {
    Json(handle.snapshot())
}

/// GET /stats
async fn stats(State(handle): State<Arc<SentryHandle>>) -> Json<TransparencyStats> {
    Json(handle.stats())
}

/// GET /capture/photo
async fn capture_photo(State(handle): State<Arc<SentryHandle>>) -> Result<Response, ApiError> {
    let photo = handle
        .snapshot()
        .capture
        .map(|capture| capture.photo)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "NO_CAPTURE", "No photo in this cycle"))?;
    Ok(image_response(&photo))
}

/// GET /capture/processed
async fn capture_processed(
    State(handle): State<Arc<SentryHandle>>,
) -> Result<Response, ApiError> {
    let processed = handle
        .snapshot()
        .capture
        .and_then(|capture| capture.processed)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "NO_PROCESSED",
                "No processed image in this cycle",
            )
        })?;
    Ok(image_response(&processed))
}

fn image_response(image: &CapturedImage) -> Response {
    (
        [(header::CONTENT_TYPE, image.mime_type())],
        image.bytes.clone(),
    )
        .into_response()
}

fn forward(handle: &SentryHandle, command: Command) -> Result<Json<CommandResponse>, ApiError> {
    if !handle.send(command) {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SENTRY_STOPPED",
            "The sentry is no longer running",
        ));
    }
    Ok(Json(CommandResponse {
        status: "accepted".to_string(),
        command: format!("{command:?}"),
    }))
}

/// POST /reset
async fn reset(State(handle): State<Arc<SentryHandle>>) -> Result<Json<CommandResponse>, ApiError> {
    forward(&handle, Command::Reset)
}

/// POST /chat/start
async fn chat_start(
    State(handle): State<Arc<SentryHandle>>,
) -> Result<Json<CommandResponse>, ApiError> {
    forward(&handle, Command::StartChat)
}

/// POST /chat/stop
async fn chat_stop(
    State(handle): State<Arc<SentryHandle>>,
) -> Result<Json<CommandResponse>, ApiError> {
    forward(&handle, Command::StopChat)
}

/// POST /camera/retry
async fn camera_retry(
    State(handle): State<Arc<SentryHandle>>,
) -> Result<Json<CommandResponse>, ApiError> {
    forward(&handle, Command::RetryCamera)
}

/// Build the router without binding it.
pub fn router(handle: SentryHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/capture/photo", get(capture_photo))
        .route("/capture/processed", get(capture_processed))
        .route("/reset", post(reset))
        .route("/chat/start", post(chat_start))
        .route("/chat/stop", post(chat_stop))
        .route("/camera/retry", post(camera_retry))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::new(handle))
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    handle: SentryHandle,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = router(handle);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Control server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
