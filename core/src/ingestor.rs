use std::io::Read;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::ProcessingConfig;
use crate::errors::{self, IngestionError, StorageError, WorkerError};
use crate::pool::WorkerPool;
use crate::record::{StoredUser, parse_row};
use crate::source::Chunk;
use crate::source::csv::ChunkReader;
use crate::storage::{PageRequest, RecordStore};
use crate::telemetry::IngestionResult;
use crate::writer::BatchWriter;

/// Lifecycle of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Reading,
    Draining,
    Completed,
    Aborted,
}

impl IngestState {
    pub fn can_move_to(self, next: IngestState) -> bool {
        use IngestState::*;
        matches!(
            (self, next),
            (Idle, Reading) | (Reading, Draining) | (Reading, Aborted) | (Draining, Completed)
        )
    }
}

/// What one worker did with its chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub sequence: usize,
    pub rows: usize,
    pub rejected: usize,
    /// Valid rows handed to the writer.
    pub attempted: usize,
    pub write_failed: bool,
}

/// The ingestor orchestrates the data flow from an uploaded CSV stream to the
/// record store.
///
/// One reader task fills a bounded queue with chunks; every chunk gets its own
/// worker task, and at most `max_concurrency` workers parse and write at once.
/// A chunk whose insert fails is counted and left behind; the run carries on.
/// A broken input stream aborts the run, but chunks already handed out still
/// finish.
pub struct Ingestor {
    store: Arc<dyn RecordStore>,
    config: ProcessingConfig,
}

impl Ingestor {
    pub fn new(store: Arc<dyn RecordStore>, config: ProcessingConfig) -> Self {
        Self { store, config }
    }

    pub async fn fetch_page(&self, page: PageRequest) -> Result<Vec<StoredUser>, StorageError> {
        self.store.fetch_page(page).await
    }

    /// Runs one upload to completion.
    ///
    /// Partial success is success: rejected rows and failed chunks show up in
    /// the returned counters. Only a stream failure or a broken worker pool is
    /// an error, and a stream failure still carries the counters gathered so
    /// far.
    pub async fn ingest<R>(&self, input: R) -> errors::Result<IngestionResult>
    where
        R: Read + Send + 'static,
    {
        let mut run = IngestRun::new();
        info!(
            chunk_size = self.config.chunk_size,
            max_concurrency = self.config.max_concurrency,
            max_buffered_rows = self.config.max_buffered_rows(),
            "Starting CSV ingestion"
        );

        let (tx, mut rx) = mpsc::channel::<Chunk>(self.config.queue_capacity.max(1));
        let reader = ChunkReader::new(self.config.chunk_size).spawn(input, tx);
        run.transition(IngestState::Reading)?;

        let writer = Arc::new(BatchWriter::new(
            self.store.clone(),
            self.config.max_sub_batch,
        ));
        let mut pool = WorkerPool::new(
            self.config.max_concurrency,
            self.config.max_pending_chunks,
        );

        while let Some(chunk) = rx.recv().await {
            run.result.chunks_dispatched += 1;
            run.result.rows_read += chunk.len();

            let writer = writer.clone();
            pool.spawn(move || process_chunk(chunk, writer)).await?;
        }

        let read_outcome = reader.await;
        let stream_error = match read_outcome {
            Ok(Ok(summary)) => {
                debug_assert_eq!(summary.rows_read, run.result.rows_read);
                run.transition(IngestState::Draining)?;
                None
            }
            Ok(Err(e)) => {
                run.transition(IngestState::Aborted)?;
                Some(e)
            }
            Err(e) => {
                run.transition(IngestState::Aborted)?;
                pool.join_all().await;
                return Err(IngestionError::Internal {
                    reason: format!("CSV reader task failed: {e}"),
                });
            }
        };

        for outcome in pool.join_all().await {
            run.absorb(outcome);
        }
        run.settle_unaccounted_rows();

        let result = run.result.clone();
        match stream_error {
            None => {
                run.transition(IngestState::Completed)?;
                info!(
                    state = ?run.state,
                    rows_read = result.rows_read,
                    rows_rejected = result.rows_rejected,
                    rows_inserted = result.rows_inserted,
                    rows_failed = result.rows_failed,
                    chunks_failed = result.chunks_failed,
                    "CSV ingestion completed"
                );
                Ok(result)
            }
            Some(source) => {
                error!(
                    state = ?run.state,
                    error = %source,
                    rows_read = result.rows_read,
                    rows_inserted = result.rows_inserted,
                    "CSV ingestion aborted by stream error"
                );
                Err(IngestionError::StreamRead {
                    source,
                    partial: result,
                })
            }
        }
    }
}

/// Parses the chunk, drops rejected rows, writes the rest.
async fn process_chunk(chunk: Chunk, writer: Arc<BatchWriter>) -> ChunkOutcome {
    let mut records = Vec::with_capacity(chunk.len());
    let mut rejected = 0;

    for row in &chunk.rows {
        match parse_row(row) {
            Ok(record) => records.push(record),
            Err(reason) => {
                rejected += 1;
                warn!(
                    line = row.position().map(|p| p.line()),
                    reason = %reason,
                    row = ?row,
                    "Skipping rejected row"
                );
            }
        }
    }

    let attempted = records.len();
    let write_failed = writer.write(records).await.is_err();
    if write_failed {
        error!(
            chunk = chunk.sequence,
            first_line = chunk.first_line,
            rows = attempted,
            "Chunk write failed"
        );
    } else {
        debug!(chunk = chunk.sequence, rows = chunk.len(), rejected, "Chunk processed");
    }

    ChunkOutcome {
        sequence: chunk.sequence,
        rows: chunk.len(),
        rejected,
        attempted,
        write_failed,
    }
}

struct IngestRun {
    state: IngestState,
    result: IngestionResult,
}

impl IngestRun {
    fn new() -> Self {
        Self {
            state: IngestState::Idle,
            result: IngestionResult::default(),
        }
    }

    fn transition(&mut self, next: IngestState) -> errors::Result<()> {
        if !self.state.can_move_to(next) {
            return Err(IngestionError::Internal {
                reason: format!("illegal ingestion state change {:?} -> {next:?}", self.state),
            });
        }
        debug!(from = ?self.state, to = ?next, "Ingestion state change");
        self.state = next;
        Ok(())
    }

    fn absorb(&mut self, outcome: Result<ChunkOutcome, WorkerError>) {
        match outcome {
            Ok(chunk) => {
                self.result.rows_rejected += chunk.rejected;
                if chunk.write_failed {
                    self.result.chunks_failed += 1;
                    self.result.rows_failed += chunk.attempted;
                } else {
                    self.result.rows_inserted += chunk.attempted;
                }
            }
            Err(e) => {
                error!(error = %e, "Chunk worker failed");
                self.result.chunks_failed += 1;
            }
        }
    }

    /// Rows of chunks whose worker died are neither rejected nor inserted;
    /// book them as failed so the counters still add up.
    fn settle_unaccounted_rows(&mut self) {
        let accounted = self.result.rows_rejected + self.result.rows_attempted();
        if let Some(missing) = self.result.rows_read.checked_sub(accounted) {
            self.result.rows_failed += missing;
        }
    }
}
