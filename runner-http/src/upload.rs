use std::io::SeekFrom;

use axum::Json;
use axum::extract::{Multipart, State};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{error, info};

use crate::AppState;
use crate::error::{ApiError, Result};
use crate::types::UploadResponse;

const FILE_FIELD: &str = "file";
const SUCCESS_MESSAGE: &str = "CSV file processed successfully and data stored in database.";

/// Handler for `POST /upload-csv`.
///
/// The `file` part is spooled to an anonymous temp file first so the whole
/// upload never sits in memory, then streamed through the ingestor.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let upload = spool_file_field(&mut multipart).await?;

    let result = state.ingestor.ingest(upload).await.map_err(|e| {
        error!(error = %e, "CSV ingestion failed");
        ApiError::from(e)
    })?;

    info!(
        rows_read = result.rows_read,
        rows_inserted = result.rows_inserted,
        "CSV upload processed"
    );
    Ok(Json(UploadResponse {
        message: SUCCESS_MESSAGE.to_string(),
        result,
    }))
}

async fn spool_file_field(multipart: &mut Multipart) -> Result<std::fs::File> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request("Failed to get file", e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let spool = tempfile::tempfile().map_err(|e| ApiError::internal("Failed to open file", e))?;
        let mut spool = tokio::fs::File::from_std(spool);
        let mut bytes = 0usize;

        while let Some(data) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request("Failed to open file", e))?
        {
            bytes += data.len();
            spool
                .write_all(&data)
                .await
                .map_err(|e| ApiError::internal("Failed to open file", e))?;
        }

        spool
            .flush()
            .await
            .map_err(|e| ApiError::internal("Failed to open file", e))?;
        spool
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| ApiError::internal("Failed to open file", e))?;

        info!(bytes, file_name = field.file_name(), "Received CSV upload");
        return Ok(spool.into_std().await);
    }

    Err(ApiError::bad_request(
        "Failed to get file",
        format!("multipart field `{FILE_FIELD}` is missing"),
    ))
}
