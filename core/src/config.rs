use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ConfigError;

pub const CONFIG_ENV_VAR: &str = "INGEST_CONFIG";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Where the service writes its JSON log lines and where `/api/logs` reads them.
    pub log_file: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            log_file: Some(PathBuf::from("File.log")),
            max_upload_bytes: 30 << 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            database_url: None,
            max_connections: 10,
            acquire_timeout_ms: 30_000,
        }
    }
}

/// Knobs of the CSV ingestion pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Rows per chunk handed to one worker.
    pub chunk_size: usize,
    /// Upper bound on rows per insert statement.
    pub max_sub_batch: usize,
    /// Admission tokens: chunks parsed and written at the same time.
    pub max_concurrency: usize,
    /// Chunks the reader may queue ahead of the coordinator.
    pub queue_capacity: usize,
    /// Chunks held by spawned tasks that have not finished yet.
    pub max_pending_chunks: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let max_concurrency = default_concurrency();
        Self {
            chunk_size: 5000,
            max_sub_batch: 10_000,
            max_concurrency,
            queue_capacity: 10,
            max_pending_chunks: max_concurrency * 2,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 4
}

impl ProcessingConfig {
    /// Most rows one run can hold in memory at once: the queue, the pending
    /// tasks and the chunk the reader is filling.
    pub fn max_buffered_rows(&self) -> usize {
        (self.queue_capacity + self.max_pending_chunks + 1) * self.chunk_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("chunk_size", self.chunk_size),
            ("max_sub_batch", self.max_sub_batch),
            ("max_concurrency", self.max_concurrency),
            ("queue_capacity", self.queue_capacity),
            ("max_pending_chunks", self.max_pending_chunks),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("processing.{name} must be at least 1"),
                });
            }
        }
        Ok(())
    }
}

pub async fn load_config(config_path: Option<&str>) -> Result<IngestConfig, ConfigError> {
    match config_path {
        Some(path) => IngestConfig::from_file(path),
        None => IngestConfig::from_env(),
    }
}

impl IngestConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            origin: path.to_string(),
            error: Box::new(e),
        })?;
        Self::from_yaml(path, &content)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config_str = std::env::var(CONFIG_ENV_VAR).map_err(|_| ConfigError::Invalid {
            message: format!("{CONFIG_ENV_VAR} environment variable not set"),
        })?;
        Self::from_yaml(CONFIG_ENV_VAR, &config_str)
    }

    fn from_yaml(origin: &str, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::LoadFailed {
            origin: origin.to_string(),
            error: Box::new(e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_addr.is_empty() {
            return Err(ConfigError::Invalid {
                message: "server.listen_addr cannot be empty".to_string(),
            });
        }

        if self.storage.backend == StorageBackend::Postgres {
            match self.storage.database_url.as_deref() {
                Some(url) if !url.is_empty() => {}
                _ => {
                    return Err(ConfigError::MissingField {
                        field: "storage.database_url".to_string(),
                    });
                }
            }
            if self.storage.max_connections == 0 {
                return Err(ConfigError::ValidationFailed {
                    reason: "storage.max_connections must be at least 1".to_string(),
                });
            }
        }

        self.processing.validate()
    }
}
