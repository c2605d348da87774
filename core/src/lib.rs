pub mod config;
pub mod errors;
pub mod ingestor;
pub mod logs;
pub mod pool;
pub mod record;
pub mod source;
pub mod storage;
pub mod telemetry;
pub mod writer;

pub use config::IngestConfig;
pub use errors::{IngestionError, Result};
pub use ingestor::Ingestor;
pub use telemetry::IngestionResult;
