use crate::batch_source::error::BatchReadError;
use crate::types::report::SourceFailure;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One location's currently available records at one granularity, as read
/// from a single source unit.
///
/// A batch is transient input to the consolidation engine: it has no identity
/// beyond its location code and granularity. The `records` frame always
/// carries a `date` column normalized to `Datetime(Milliseconds)` plus
/// `location_code` and `location_name` columns; the measurement columns are
/// whatever the source provided.
#[derive(Debug, Clone)]
pub struct Batch {
    pub location_code: String,
    pub location_name: String,
    /// Source unit this batch was read from, kept for reporting.
    pub path: PathBuf,
    pub records: DataFrame,
}

impl Batch {
    /// Newest timestamp in this batch, as epoch milliseconds.
    ///
    /// Returns `Ok(None)` when every timestamp is null. Computed on demand;
    /// the engine treats a failure here as "reprocess the batch" rather than
    /// an abort.
    pub fn max_timestamp(&self) -> Result<Option<i64>, BatchReadError> {
        Ok(self.records.column("date")?.datetime()?.max())
    }
}

/// Everything the batch source reader discovered for one granularity: the
/// readable batches keyed by location code, plus the units that failed to
/// parse and were skipped.
///
/// The map is ordered so that a merge over the whole set is deterministic.
#[derive(Debug, Clone, Default)]
pub struct BatchSet {
    pub batches: BTreeMap<String, Batch>,
    pub failures: Vec<SourceFailure>,
}

impl BatchSet {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
