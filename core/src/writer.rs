use std::sync::Arc;

use tracing::{debug, error};

use crate::errors::StorageError;
use crate::record::UserRecord;
use crate::storage::RecordStore;

/// Sends a chunk's validated records to storage in one bulk call.
pub struct BatchWriter {
    store: Arc<dyn RecordStore>,
    max_sub_batch: usize,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn RecordStore>, max_sub_batch: usize) -> Self {
        Self {
            store,
            max_sub_batch: max_sub_batch.max(1),
        }
    }

    /// Returns how many rows were written. An empty batch never reaches
    /// storage. Failures are logged and returned as-is; there is no retry.
    pub async fn write(&self, records: Vec<UserRecord>) -> Result<usize, StorageError> {
        if records.is_empty() {
            debug!("No valid rows in chunk, skipping insert");
            return Ok(0);
        }

        let rows = records.len();
        match self.store.bulk_insert(&records, self.max_sub_batch).await {
            Ok(()) => Ok(rows),
            Err(e) => {
                error!(
                    rows,
                    max_sub_batch = self.max_sub_batch,
                    unavailable = e.is_unavailable(),
                    error = %e,
                    "Database insertion error"
                );
                Err(e)
            }
        }
    }
}
