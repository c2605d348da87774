use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{error, info};

use crate::errors::LogAnalysisError;

/// Lines per severity. A line counts once, checked in the order INFO, ERROR, DEBUG.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogLevelCounts {
    #[serde(rename = "INFO")]
    pub info: usize,
    #[serde(rename = "ERROR")]
    pub error: usize,
    #[serde(rename = "DEBUG")]
    pub debug: usize,
}

impl LogLevelCounts {
    fn record_line(&mut self, line: &str) {
        let line = line.to_uppercase();
        if line.contains("INFO") {
            self.info += 1;
        } else if line.contains("ERROR") {
            self.error += 1;
        } else if line.contains("DEBUG") {
            self.debug += 1;
        }
    }
}

/// Longest line the analyzer accepts before giving up on the file.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Scans a log file line by line, case-insensitively. Invalid UTF-8 is
/// tolerated; a line over [`MAX_LINE_BYTES`] is an error.
pub async fn analyze_log_file(path: impl AsRef<Path>) -> Result<LogLevelCounts, LogAnalysisError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let file = File::open(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            error!(file_path = %path_str, "Log file does not exist");
            LogAnalysisError::NotFound {
                path: path_str.clone(),
            }
        } else {
            error!(file_path = %path_str, error = %e, "Failed to open log file");
            LogAnalysisError::Io {
                path: path_str.clone(),
                source: e,
            }
        }
    })?;

    let counts = count_levels(BufReader::new(file), &path_str, MAX_LINE_BYTES).await?;
    info!(?counts, "Log analysis completed");
    Ok(counts)
}

async fn count_levels<R>(
    mut reader: R,
    path_str: &str,
    max_line_bytes: usize,
) -> Result<LogLevelCounts, LogAnalysisError>
where
    R: AsyncBufRead + Unpin,
{
    let mut counts = LogLevelCounts::default();
    let mut line = Vec::new();
    let mut line_no = 0;
    loop {
        line.clear();
        line_no += 1;
        let read = (&mut reader)
            .take(max_line_bytes as u64 + 1)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| LogAnalysisError::Io {
                path: path_str.to_string(),
                source: e,
            })?;
        if read == 0 {
            break;
        }
        let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        if content.len() > max_line_bytes {
            error!(file_path = %path_str, line = line_no, "Log line too long");
            return Err(LogAnalysisError::LineTooLong {
                path: path_str.to_string(),
                line: line_no,
                limit: max_line_bytes,
            });
        }
        counts.record_line(&String::from_utf8_lossy(content));
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_counts_each_level() {
        let mut log = NamedTempFile::new().unwrap();
        writeln!(log, "INFO This is an info log").unwrap();
        writeln!(log, "ERROR This is an error log").unwrap();
        writeln!(log, "DEBUG This is a debug log").unwrap();

        let counts = analyze_log_file(log.path()).await.unwrap();

        assert_eq!(counts, LogLevelCounts { info: 1, error: 1, debug: 1 });
    }

    #[tokio::test]
    async fn test_is_case_insensitive_and_counts_a_line_once() {
        let mut log = NamedTempFile::new().unwrap();
        writeln!(log, r#"{{"level":"info","fields":{{"message":"error budget ok"}}}}"#).unwrap();
        writeln!(log, "something went Error").unwrap();
        writeln!(log, "debug: error here").unwrap();
        writeln!(log, "WARN nothing to see").unwrap();
        log.write_all(b"info \xff\xfe\n").unwrap();

        let counts = analyze_log_file(log.path()).await.unwrap();

        assert_eq!(counts, LogLevelCounts { info: 2, error: 2, debug: 0 });
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = analyze_log_file("non_existing_file.log").await.unwrap_err();
        assert!(matches!(err, LogAnalysisError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_line_over_the_limit_is_an_error() {
        let input: &[u8] = b"INFO short\nERROR this line is far too long\nDEBUG never reached\n";

        let err = count_levels(input, "app.log", 16).await.unwrap_err();

        match err {
            LogAnalysisError::LineTooLong { line, limit, .. } => {
                assert_eq!(line, 2);
                assert_eq!(limit, 16);
            }
            other => panic!("expected LineTooLong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_line_at_the_limit_is_counted() {
        let input: &[u8] = b"INFO exactly 16!\nDEBUG x";

        let counts = count_levels(input, "app.log", 16).await.unwrap();

        assert_eq!(counts, LogLevelCounts { info: 1, error: 0, debug: 1 });
    }

    #[test]
    fn test_serializes_upper_case_keys() {
        let json = serde_json::to_value(LogLevelCounts { info: 3, error: 2, debug: 1 }).unwrap();
        assert_eq!(json, serde_json::json!({ "INFO": 3, "ERROR": 2, "DEBUG": 1 }));
    }
}
