//! HTTP surface: a thin axum router over [`PdfService`].
//!
//! - `GET /health` → `{"status":"ok","version":…}`
//! - `POST /api/pdf` with a lesson payload → `application/pdf` attachment
//!
//! Failures come back as `{"error":{"kind","message","issues"}}` with 400,
//! 422 or 500.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::Serialize;

use crate::error::{ErrorKind, ForgeError, ValidationIssue};
use crate::pipeline::PdfService;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    kind: ErrorKind,
    message: String,
    issues: &'a [ValidationIssue],
}

impl IntoResponse for ForgeError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::EmptyExtraction => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::RenderFailure => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let ForgeError::Render(cause) = &self {
            error!("server: render failed: {cause}");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.public_message(),
                issues: self.issues(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn generate_pdf(
    State(service): State<Arc<PdfService>>,
    body: Bytes,
) -> Result<Response, ForgeError> {
    let output = service.generate_from_json(&body).await?;
    let disposition = format!("attachment; filename=\"{}\"", output.filename);
    Ok((
        [
            (header::CONTENT_TYPE, output.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        output.bytes,
    )
        .into_response())
}

/// Build the router. Bodies over `max_body_bytes` are rejected with 413.
pub fn router(service: Arc<PdfService>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/pdf", post(generate_pdf))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(service)
}

/// Serve `app` on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("server: listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
