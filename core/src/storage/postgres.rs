use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::errors::StorageError;
use crate::record::{StoredUser, UserRecord};
use crate::storage::{PageRequest, RecordStore};

const INSERT_COLUMNS: usize = 10;
/// Postgres caps a statement at 65535 bind parameters.
pub const MAX_ROWS_PER_STATEMENT: usize = u16::MAX as usize / INSERT_COLUMNS;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_data (
    id          BIGSERIAL PRIMARY KEY,
    first_name  VARCHAR(100) NOT NULL,
    last_name   VARCHAR(100) NOT NULL,
    email       VARCHAR(150) NOT NULL,
    age         INTEGER NOT NULL,
    gender      VARCHAR(10) NOT NULL,
    department  VARCHAR(100) NOT NULL,
    company     VARCHAR(100) NOT NULL,
    salary      DOUBLE PRECISION NOT NULL,
    date_joined DATE NOT NULL,
    is_active   BOOLEAN NOT NULL
)
"#;

const INSERT_PREFIX: &str = "INSERT INTO user_data \
    (first_name, last_name, email, age, gender, department, company, salary, date_joined, is_active) ";

const SELECT_PAGE: &str = "SELECT id, first_name, last_name, email, age, gender, department, \
    company, salary, date_joined, is_active \
    FROM user_data ORDER BY id ASC OFFSET $1 LIMIT $2";

/// `user_data` table in Postgres, through a shared connection pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StorageError::Unavailable {
                reason: "no database_url configured".to_string(),
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect(url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!(max_connections = config.max_connections, "Connected to Postgres");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates `user_data` when it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        info!("Table user_data is ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn bulk_insert(
        &self,
        records: &[UserRecord],
        max_sub_batch: usize,
    ) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let rows_per_statement = max_sub_batch.clamp(1, MAX_ROWS_PER_STATEMENT);
        let mut tx = self.pool.begin().await?;

        for sub_batch in records.chunks(rows_per_statement) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(INSERT_PREFIX);
            builder.push_values(sub_batch, |mut row, record| {
                row.push_bind(record.first_name.as_str())
                    .push_bind(record.last_name.as_str())
                    .push_bind(record.email.as_str())
                    .push_bind(record.age)
                    .push_bind(record.gender.as_str())
                    .push_bind(record.department.as_str())
                    .push_bind(record.company.as_str())
                    .push_bind(record.salary)
                    .push_bind(record.date_joined)
                    .push_bind(record.is_active);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(
            rows = records.len(),
            statements = records.len().div_ceil(rows_per_statement),
            "Bulk insert committed"
        );
        Ok(())
    }

    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<StoredUser>, StorageError> {
        let rows = sqlx::query_as::<_, StoredUser>(SELECT_PAGE)
            .bind(page.offset())
            .bind(page.limit())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
