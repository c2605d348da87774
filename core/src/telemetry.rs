use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "ingest_core=info,runner_http=info,ingest_server=info";

/// Installs the global subscriber: human-readable output on stdout and, when a
/// path is given, JSON lines appended to that file.
pub fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Aggregate counters for one ingestion run.
///
/// `rows_read == rows_rejected + rows_inserted + rows_failed` holds for every
/// finished run; the last two together are the rows attempted for insert.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub rows_read: usize,
    pub rows_rejected: usize,
    pub rows_inserted: usize,
    /// Valid rows lost because their chunk's insert failed.
    pub rows_failed: usize,
    pub chunks_dispatched: usize,
    pub chunks_failed: usize,
}

impl IngestionResult {
    pub fn rows_attempted(&self) -> usize {
        self.rows_inserted + self.rows_failed
    }

    pub fn is_balanced(&self) -> bool {
        self.rows_read == self.rows_rejected + self.rows_attempted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_counters() {
        let result = IngestionResult {
            rows_read: 10,
            rows_rejected: 2,
            rows_inserted: 5,
            rows_failed: 3,
            chunks_dispatched: 2,
            chunks_failed: 1,
        };
        assert_eq!(result.rows_attempted(), 8);
        assert!(result.is_balanced());

        let skewed = IngestionResult {
            rows_inserted: 1,
            ..result.clone()
        };
        assert!(!skewed.is_balanced());
    }

    #[test]
    fn test_serializes_snake_case_fields() {
        let json = serde_json::to_value(IngestionResult::default()).unwrap();
        assert_eq!(json["rows_read"], 0);
        assert_eq!(json["chunks_failed"], 0);
    }
}
