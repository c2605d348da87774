use thiserror::Error;

use crate::telemetry::IngestionResult;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read input stream after {} rows: {source}", .partial.rows_read)]
    StreamRead {
        #[source]
        source: StreamReadError,
        /// Counters accumulated before the reader gave up.
        partial: IngestionResult,
    },

    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error("Worker pool error: {0}")]
    Worker(#[from] WorkerError),
}

/// Fatal problems with the input stream itself. Stops the reader.
#[derive(Error, Debug)]
pub enum StreamReadError {
    #[error("I/O failure near line {line}: {source}")]
    Io {
        line: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV near line {line}: {reason}")]
    Format { line: u64, reason: String },
}

impl From<csv::Error> for StreamReadError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or_default();
        let reason = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(source) => StreamReadError::Io { line, source },
            _ => StreamReadError::Format { line, reason },
        }
    }
}

/// Why a single CSV row did not become a record. Never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowRejection {
    #[error("expected at least {expected} fields, found {found}")]
    MissingFields { expected: usize, found: usize },

    #[error("field `{field}` is empty")]
    EmptyField { field: &'static str },

    #[error("field `{field}` is not a base-10 integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidFloat { field: &'static str, value: String },

    #[error("field `{field}` is not a YYYY-MM-DD date: {value:?}")]
    InvalidDate { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("Invalid page request: {reason}")]
    InvalidPage { reason: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable {
                    reason: err.to_string(),
                }
            }
            other => StorageError::Query(other),
        }
    }
}

impl StorageError {
    /// Connection-level failures, as opposed to a statement the database refused.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Admission pool closed before the task could start")]
    PoolClosed,

    #[error("Worker task failed: {reason}")]
    Panicked { reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Failed to load configuration from {origin}: {error}")]
    LoadFailed {
        origin: String,
        #[source]
        error: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum LogAnalysisError {
    #[error("log file does not exist: {path}")]
    NotFound { path: String },

    #[error("failed to read log file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line} of {path} is longer than {limit} bytes")]
    LineTooLong {
        path: String,
        line: usize,
        limit: usize,
    },
}

pub type Result<T> = std::result::Result<T, IngestionError>;

impl IngestionError {
    /// Counters gathered before the failure, when the run got far enough to have any.
    pub fn partial_result(&self) -> Option<&IngestionResult> {
        match self {
            IngestionError::StreamRead { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
