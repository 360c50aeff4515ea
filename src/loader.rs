//! Bulk loader: range rows in, batched index writes out
//!
//! Each row is turned into a [`RangeRecord`] and staged into the current
//! [`WriteBatch`]. Every `batch_size` processed rows the batch is committed
//! and a progress line is logged; a final commit flushes the remainder. The
//! final commit is issued even when nothing is left over.
//!
//! Batching is there to amortize store round trips. It is not a transaction:
//! if a run dies mid-way, committed batches stay and the pending one is lost.
//!
//! Rows that cannot be used are logged and counted, never retried, and never
//! stop the load. Junk rows (see [`crate::range_record::is_junk`]) are
//! dropped without a warning and do not count as processed, so they never
//! move the flush cadence either. A failed commit is a run-level error and
//! aborts the load.

use crate::error::{Result, RowError};
use crate::range_index::RangeIndex;
use crate::range_record::{RangeRecord, RangeRow};
use crate::reference::LocationTable;
use crate::store::{OrderedStore, WriteBatch};
use log::{debug, info, warn};

/// Rows per commit unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// What happened to one row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Staged into the current batch
    Inserted,
    /// Placeholder range filtered out
    Junk,
    /// Row could not be used
    Skipped(RowError),
}

/// Counters for one load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Inserted plus skipped rows
    pub processed: usize,
    /// Rows staged into the index
    pub inserted: usize,
    /// Junk rows dropped
    pub junk: usize,
    /// Rows skipped because of a row error
    pub skipped: usize,
    /// Commits issued, including the final one
    pub commits: usize,
}

/// Feeds range rows into a [`RangeIndex`]
pub struct BulkLoader<'a, S> {
    index: &'a RangeIndex<S>,
    locations: &'a LocationTable,
    batch_size: usize,
}

impl<'a, S: OrderedStore> BulkLoader<'a, S> {
    /// Loader with the default batch size
    pub fn new(index: &'a RangeIndex<S>, locations: &'a LocationTable) -> Self {
        Self {
            index,
            locations,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the number of rows per commit (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Rows per commit
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Build the record for one row and stage it into `batch`
    ///
    /// Only a failure to encode the payload is an error here; everything
    /// wrong with the row itself comes back as [`RowOutcome::Skipped`].
    pub fn process_row(&self, batch: &mut WriteBatch, row: &RangeRow) -> Result<RowOutcome> {
        match RangeRecord::from_row(row, self.locations) {
            Ok(Some(record)) => {
                self.index.stage(batch, &record)?;
                Ok(RowOutcome::Inserted)
            }
            Ok(None) => Ok(RowOutcome::Junk),
            Err(err) => Ok(RowOutcome::Skipped(err)),
        }
    }

    /// Load every row, committing in batches
    pub fn load<I>(&self, rows: I) -> Result<LoadReport>
    where
        I: IntoIterator<Item = std::result::Result<RangeRow, RowError>>,
    {
        let mut report = LoadReport::default();
        let mut batch = WriteBatch::with_capacity(self.batch_size.saturating_mul(2));

        // Numbered from the first data row; banner and header lines are not counted
        for (row_number, row) in (1u64..).zip(rows) {
            let outcome = match row {
                Ok(row) => self.process_row(&mut batch, &row)?,
                Err(err) => RowOutcome::Skipped(err),
            };

            match outcome {
                RowOutcome::Inserted => report.inserted += 1,
                RowOutcome::Junk => {
                    debug!("Dropping junk range at data row {}", row_number);
                    report.junk += 1;
                    continue;
                }
                RowOutcome::Skipped(err) => {
                    warn!("Could not save range at data row {}: {}", row_number, err);
                    report.skipped += 1;
                }
            }

            report.processed += 1;
            if report.processed % self.batch_size == 0 {
                info!("Flushing batch: did {} ranges", report.processed);
                self.index.commit(batch.take())?;
                report.commits += 1;
            }
        }

        self.index.commit(batch.take())?;
        report.commits += 1;

        info!(
            "Imported {} ranges ({} inserted, {} skipped, {} junk)",
            report.processed, report.inserted, report.skipped, report.junk
        );
        Ok(report)
    }
}
