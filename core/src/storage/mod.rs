pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::errors::StorageError;
use crate::record::{StoredUser, UserRecord};

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

const DEFAULT_PAGE: &str = "1";
const DEFAULT_PAGE_SIZE: &str = "10";

/// The `RecordStore` trait is the contract for the relational table the
/// service writes to and pages through.
///
/// Implementations must tolerate concurrent calls: every ingestion worker
/// holds the same handle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts `records` in statements of at most `max_sub_batch` rows. The
    /// call succeeds or fails as a whole; no per-statement results.
    async fn bulk_insert(
        &self,
        records: &[UserRecord],
        max_sub_batch: usize,
    ) -> Result<(), StorageError>;

    /// One page of records, ordered by id.
    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<StoredUser>, StorageError>;
}

/// A 1-based page number and a page size, both at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self, StorageError> {
        if page < 1 {
            return Err(StorageError::InvalidPage {
                reason: "Invalid page number".to_string(),
            });
        }
        if size < 1 {
            return Err(StorageError::InvalidPage {
                reason: "Invalid size number".to_string(),
            });
        }
        // The offset is bound as a signed 64-bit value.
        if (i64::from(page) - 1).checked_mul(i64::from(size)).is_none() {
            return Err(StorageError::InvalidPage {
                reason: "Invalid page number".to_string(),
            });
        }
        Ok(Self { page, size })
    }

    /// Parses raw query-string values, defaulting to page 1 of 10.
    pub fn parse(page: Option<&str>, size: Option<&str>) -> Result<Self, StorageError> {
        let page = page.unwrap_or(DEFAULT_PAGE).parse::<u32>().map_err(|_| {
            StorageError::InvalidPage {
                reason: "Invalid page number".to_string(),
            }
        })?;
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE).parse::<u32>().map_err(|_| {
            StorageError::InvalidPage {
                reason: "Invalid size number".to_string(),
            }
        })?;
        Self::new(page, size)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}
