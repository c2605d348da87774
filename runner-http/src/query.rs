use axum::Json;
use axum::extract::{Query, State};
use ingest_core::errors::{LogAnalysisError, StorageError};
use ingest_core::logs::{LogLevelCounts, analyze_log_file};
use ingest_core::record::StoredUser;
use ingest_core::storage::PageRequest;
use tracing::{error, info};

use crate::AppState;
use crate::error::{ApiError, Result};
use crate::types::PageQuery;

/// Handler for `GET /api/records?page=&size=`.
pub async fn records_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<StoredUser>>> {
    let page = PageRequest::parse(query.page.as_deref(), query.size.as_deref()).map_err(|e| {
        let message = match e {
            StorageError::InvalidPage { reason } => reason,
            other => other.to_string(),
        };
        error!(page = ?query.page, size = ?query.size, "{message}");
        ApiError::BadRequest {
            message,
            details: None,
        }
    })?;

    let records = state.ingestor.fetch_page(page).await.map_err(|e| {
        error!(error = %e, "Failed to fetch records");
        ApiError::internal("Failed to fetch records", e)
    })?;

    info!(records_count = records.len(), "Records fetched successfully");
    Ok(Json(records))
}

/// Handler for `GET /api/logs`.
pub async fn logs_handler(State(state): State<AppState>) -> Result<Json<LogLevelCounts>> {
    let path = state.log_file.as_deref().ok_or_else(|| ApiError::Internal {
        message: "no log file configured".to_string(),
        details: None,
    })?;

    let counts = analyze_log_file(path).await.map_err(|e: LogAnalysisError| {
        error!(error = %e, "Failed to analyze logs");
        ApiError::Internal {
            message: e.to_string(),
            details: None,
        }
    })?;

    Ok(Json(counts))
}
