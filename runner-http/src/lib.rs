//! HTTP surface of the CSV ingestion service.
//!
//! The server is built using axum and provides:
//! - `POST /upload-csv`: multipart upload, field `file`, ingested in chunks
//! - `GET /api/records`: paginated user records
//! - `GET /api/logs`: line counts per severity of the service log

pub mod error;
pub mod query;
pub mod types;
pub mod upload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use ingest_core::Ingestor;
use tracing::info;

pub use error::{ApiError, Result};

use crate::query::{logs_handler, records_handler};
use crate::upload::upload_handler;

/// HTTP server that takes CSV uploads and serves what they stored.
pub struct IngestServer {
    state: AppState,
    max_upload_bytes: usize,
}

#[derive(Clone)]
pub struct AppState {
    ingestor: Arc<Ingestor>,
    log_file: Option<PathBuf>,
}

impl IngestServer {
    pub fn new(ingestor: Arc<Ingestor>, log_file: Option<PathBuf>, max_upload_bytes: usize) -> Self {
        let state = AppState { ingestor, log_file };
        Self {
            state,
            max_upload_bytes,
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route("/upload-csv", post(upload_handler))
            .route("/api/records", get(records_handler))
            .route("/api/logs", get(logs_handler))
            .layer(DefaultBodyLimit::max(self.max_upload_bytes))
            .layer(middleware::from_fn(log_request))
            .with_state(self.state)
    }
}

/// Logs method and URL on the way in, status and duration on the way out.
async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    info!(method = %request.method(), url = %request.uri(), "Incoming request");

    let response = next.run(request).await;

    info!(
        status = response.status().as_u16(),
        duration = ?start.elapsed(),
        "Outgoing response"
    );
    response
}
