//! Staged batch inserter
//!
//! Accepts rows one at a time and flushes them as a single multi-row insert
//! whenever the row-count or byte budget trips, whichever comes first.
//! Closing flushes the partial tail exactly once. A flush failure is fatal
//! for the enclosing module run; rows are never silently dropped.

use crate::config::PullConfig;
use crate::staging::store::{StagedRow, StagingStore, StagingTable};
use shopfetch_common::{PullError, Result};

/// Fixed per-row accounting overhead added to the payload length when
/// tracking the byte budget.
const ROW_OVERHEAD_BYTES: usize = 16;

/// Size-bounded buffered writer for one staging table.
pub struct BatchInserter<'a> {
    store: &'a StagingStore,
    table: StagingTable,
    buffer: Vec<StagedRow>,
    buffered_bytes: usize,
    max_rows: usize,
    max_bytes: usize,
    flushes: u64,
    rows_written: u64,
}

impl<'a> BatchInserter<'a> {
    pub fn new(
        store: &'a StagingStore,
        table: StagingTable,
        max_rows: usize,
        max_bytes: usize,
    ) -> Self {
        Self {
            store,
            table,
            buffer: Vec::new(),
            buffered_bytes: 0,
            max_rows: max_rows.max(1),
            max_bytes: max_bytes.max(1),
            flushes: 0,
            rows_written: 0,
        }
    }

    pub fn from_config(store: &'a StagingStore, table: StagingTable, config: &PullConfig) -> Self {
        Self::new(store, table, config.batch_max_rows, config.batch_max_bytes)
    }

    /// Buffer one row, flushing first if it would cross either budget.
    pub async fn push(&mut self, row: StagedRow) -> Result<()> {
        self.buffered_bytes += row.data.len() + ROW_OVERHEAD_BYTES;
        self.buffer.push(row);

        if self.buffer.len() >= self.max_rows || self.buffered_bytes >= self.max_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write the buffered rows as one insert. No-op when empty.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let count = self.buffer.len();
        self.store
            .insert_rows(&self.table, &self.buffer)
            .await
            .map_err(|source| PullError::StagingWrite {
                table: self.table.name().to_string(),
                source,
            })?;

        self.flushes += 1;
        self.rows_written += count as u64;
        tracing::debug!(
            table = %self.table.name(),
            rows = count,
            bytes = self.buffered_bytes,
            flush = self.flushes,
            "Flushed staged batch"
        );

        self.buffer.clear();
        self.buffered_bytes = 0;
        Ok(())
    }

    /// Flush any partial tail and consume the inserter. Returns the total
    /// number of rows written.
    pub async fn close(mut self) -> Result<u64> {
        self.flush().await?;
        Ok(self.rows_written)
    }

    /// Number of flushes issued so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Rows currently buffered and not yet written.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn fixture() -> (StagingStore, StagingTable) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = StagingStore::new(pool, "run_test").unwrap();
        let table = store.table("m", "items").unwrap();
        store.create_table(&table).await.unwrap();
        (store, table)
    }

    #[tokio::test]
    async fn test_one_flush_per_full_batch() {
        let (store, table) = fixture().await;
        let mut inserter = BatchInserter::new(&store, table.clone(), 3, usize::MAX);

        for id in 1..=6 {
            inserter.push(StagedRow::new(id, None, "x")).await.unwrap();
        }
        assert_eq!(inserter.flushes(), 2);
        assert_eq!(inserter.buffered(), 0);

        let written = inserter.close().await.unwrap();
        assert_eq!(written, 6);
        assert_eq!(store.count(&table).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_close_flushes_partial_batch_exactly_once() {
        let (store, table) = fixture().await;
        let mut inserter = BatchInserter::new(&store, table.clone(), 100, usize::MAX);

        inserter.push(StagedRow::new(1, None, "a")).await.unwrap();
        inserter.push(StagedRow::new(2, None, "b")).await.unwrap();
        assert_eq!(inserter.flushes(), 0);

        let written = inserter.close().await.unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.count(&table).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_close_on_empty_buffer_does_not_flush() {
        let (store, table) = fixture().await;
        let inserter = BatchInserter::new(&store, table.clone(), 10, usize::MAX);
        let written = inserter.close().await.unwrap();
        assert_eq!(written, 0);
        assert_eq!(store.count(&table).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_byte_budget_triggers_flush() {
        let (store, table) = fixture().await;
        // 40-byte budget: two rows of ~26 accounted bytes trip it.
        let mut inserter = BatchInserter::new(&store, table.clone(), 1_000, 40);

        inserter
            .push(StagedRow::new(1, None, "0123456789"))
            .await
            .unwrap();
        assert_eq!(inserter.flushes(), 0);
        inserter
            .push(StagedRow::new(2, None, "0123456789"))
            .await
            .unwrap();
        assert_eq!(inserter.flushes(), 1);
        assert_eq!(inserter.buffered(), 0);
    }

    #[tokio::test]
    async fn test_flush_failure_surfaces_staging_write_error() {
        let (store, table) = fixture().await;
        let mut inserter = BatchInserter::new(&store, table.clone(), 10, usize::MAX);

        inserter.push(StagedRow::new(1, None, "a")).await.unwrap();
        inserter.flush().await.unwrap();

        // Duplicate primary key: the conflict must surface, not vanish.
        inserter.push(StagedRow::new(1, None, "b")).await.unwrap();
        let err = inserter.flush().await.unwrap_err();
        assert!(matches!(err, PullError::StagingWrite { .. }));
    }
}
