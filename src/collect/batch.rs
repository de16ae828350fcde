//! Batched sink writes.

use tracing::debug;

use crate::error::HarvestError;
use crate::sink::{Sink, Table};
use crate::transform::Record;

/// Buffers rows for one table and writes them in batches.
///
/// At most one batch is buffered at a time, so a crash loses at most
/// `batch_size` rows.
pub struct BatchWriter<'a, S> {
    sink: &'a S,
    table: Table,
    batch_size: usize,
    pending: Vec<Record>,
    stored: usize,
}

impl<'a, S: Sink> BatchWriter<'a, S> {
    pub fn new(sink: &'a S, table: Table, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            table,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            stored: 0,
        }
    }

    pub async fn push(&mut self, row: Record) -> Result<(), HarvestError> {
        self.pending.push(row);
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn extend(&mut self, rows: impl IntoIterator<Item = Record>) -> Result<(), HarvestError> {
        for row in rows {
            self.push(row).await?;
        }
        Ok(())
    }

    /// Write buffered rows now.
    pub async fn flush(&mut self) -> Result<(), HarvestError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let rows = batch.len();
        let inserted = self.sink.upsert(self.table, batch).await?;
        self.stored += inserted;
        debug!(table = %self.table, rows, inserted, "batch flushed");
        Ok(())
    }

    /// Rows inserted so far (duplicates excluded).
    pub fn stored(&self) -> usize {
        self.stored
    }

    /// Flush the remainder and return the total inserted.
    pub async fn finish(mut self) -> Result<usize, HarvestError> {
        self.flush().await?;
        Ok(self.stored)
    }
}
