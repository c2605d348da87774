use ingest_core::IngestionResult;
use serde::{Deserialize, Serialize};

/// Query string of `GET /api/records`. Kept as raw strings so bad numbers
/// get our own error message instead of the extractor's.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub result: IngestionResult,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Counters of an ingestion that stopped part-way.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IngestionResult>,
}
