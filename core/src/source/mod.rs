pub mod csv;

use ::csv::StringRecord;

/// A bounded run of raw rows, processed as one unit by one worker.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position of this chunk in the input, starting at 0.
    pub sequence: usize,
    /// Line number of the first row, for log context.
    pub first_line: u64,
    pub rows: Vec<StringRecord>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What the reader published before the stream ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadSummary {
    pub rows_read: usize,
    pub chunks_emitted: usize,
}
