use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ingest_core::IngestionError;
use thiserror::Error;

use crate::types::ErrorResponse;

/// Errors that can occur while serving a request.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        details: Option<String>,
    },

    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("Failed to process CSV file")]
    Ingestion(#[from] IngestionError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>, details: impl ToString) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }

    pub fn internal(message: impl Into<String>, details: impl ToString) -> Self {
        ApiError::Internal {
            message: message.into(),
            details: Some(details.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Internal { .. } | ApiError::Ingestion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = self.to_string();
        let body = match self {
            ApiError::BadRequest { details, .. } | ApiError::Internal { details, .. } => {
                ErrorResponse {
                    error,
                    details,
                    result: None,
                }
            }
            ApiError::Ingestion(source) => ErrorResponse {
                error,
                details: Some(source.to_string()),
                result: source.partial_result().cloned(),
            },
        };

        (status_code, Json(body)).into_response()
    }
}
