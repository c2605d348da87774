use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::record::{StoredUser, UserRecord};
use crate::storage::{PageRequest, RecordStore};

/// Keeps rows in process memory. Ids are assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: Mutex<Vec<StoredUser>>,
    statements: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn snapshot(&self) -> Vec<StoredUser> {
        self.rows().clone()
    }

    /// Number of sub-batches written so far.
    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    fn rows(&self) -> MutexGuard<'_, Vec<StoredUser>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn bulk_insert(
        &self,
        records: &[UserRecord],
        max_sub_batch: usize,
    ) -> Result<(), StorageError> {
        let mut rows = self.rows();
        for sub_batch in records.chunks(max_sub_batch.max(1)) {
            for record in sub_batch {
                let id = rows.len() as i64 + 1;
                rows.push(StoredUser::from_record(id, record.clone()));
            }
            self.statements.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<StoredUser>, StorageError> {
        let rows = self.rows();
        Ok(rows
            .iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
