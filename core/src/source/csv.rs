use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::StreamReadError;
use crate::source::{Chunk, ReadSummary};

/// Streams CSV rows from a byte source into fixed-size [`Chunk`]s.
///
/// The header line is skipped. Rows are not validated here; a row with the
/// wrong number of fields still goes out and is rejected by the parser. Only a
/// failure of the stream itself (I/O, invalid UTF-8) stops the reader, and then
/// the partially filled chunk is dropped.
pub struct ChunkReader {
    chunk_size: usize,
}

impl ChunkReader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Runs the reader on the blocking pool. The channel closes when the
    /// returned task finishes, whatever the outcome.
    pub fn spawn<R>(
        self,
        input: R,
        tx: mpsc::Sender<Chunk>,
    ) -> JoinHandle<Result<ReadSummary, StreamReadError>>
    where
        R: Read + Send + 'static,
    {
        tokio::task::spawn_blocking(move || self.read_into(input, &tx))
    }

    /// Reads `input` to the end, blocking on `tx` whenever the queue is full.
    pub fn read_into<R: Read>(
        &self,
        input: R,
        tx: &mpsc::Sender<Chunk>,
    ) -> Result<ReadSummary, StreamReadError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let mut summary = ReadSummary::default();
        let mut rows: Vec<StringRecord> = Vec::with_capacity(self.chunk_size);

        for next in reader.records() {
            let row = next.map_err(|e| {
                let err = StreamReadError::from(e);
                error!(
                    error = %err,
                    rows_read = summary.rows_read,
                    discarded_rows = rows.len(),
                    "Error reading CSV stream, stopping"
                );
                err
            })?;

            rows.push(row);
            if rows.len() == self.chunk_size {
                let full = std::mem::replace(&mut rows, Vec::with_capacity(self.chunk_size));
                if !self.publish(full, tx, &mut summary) {
                    return Ok(summary);
                }
            }
        }

        if !rows.is_empty() {
            self.publish(rows, tx, &mut summary);
        }

        info!(
            rows_read = summary.rows_read,
            chunks = summary.chunks_emitted,
            "Finished reading CSV stream"
        );
        Ok(summary)
    }

    /// Returns false when nobody is listening any more.
    fn publish(
        &self,
        rows: Vec<StringRecord>,
        tx: &mpsc::Sender<Chunk>,
        summary: &mut ReadSummary,
    ) -> bool {
        let first_line = rows
            .first()
            .and_then(|row| row.position())
            .map(|p| p.line())
            .unwrap_or_default();
        let chunk = Chunk {
            sequence: summary.chunks_emitted,
            first_line,
            rows,
        };
        let len = chunk.len();

        if tx.blocking_send(chunk).is_err() {
            debug!("Chunk receiver dropped, stopping reader");
            return false;
        }

        summary.rows_read += len;
        summary.chunks_emitted += 1;
        true
    }
}
