//! Structured run reports emitted by the consolidation engine.

use crate::types::granularity::Granularity;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How a consolidation run treated the canonical store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationMode {
    /// Every batch was merged from scratch; any existing store was ignored.
    FullRebuild,
    /// Only new or updated batches were merged into the existing store.
    Incremental,
}

impl fmt::Display for ConsolidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsolidationMode::FullRebuild => write!(f, "full rebuild"),
            ConsolidationMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Per-location classification made during an incremental run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    /// The location had no rows in the canonical store; its batch is merged
    /// unconditionally.
    New,
    /// The batch reaches past the store's newest timestamp for this location.
    Updated,
    /// The batch holds nothing newer than the store; it was skipped.
    Unchanged,
}

/// A batch source unit that could not be read. The unit was skipped and the
/// rest of the run continued.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Inclusive timestamp range covered by a table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DateRange {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

/// Outcome of one consolidation run for one granularity.
///
/// Carries everything a driver needs to print or ship a run summary: the mode
/// used, the per-location classification, the units that failed to parse, and
/// the shape of the merged table.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationReport {
    pub granularity: Granularity,
    pub mode: ConsolidationMode,
    /// True when the delta was empty and the store was left untouched.
    pub up_to_date: bool,
    /// Classification of every successfully read batch, keyed by location code.
    pub locations: BTreeMap<String, LocationStatus>,
    /// Source units skipped because they could not be parsed.
    pub failed_sources: Vec<SourceFailure>,
    /// Rows in the canonical store after the run.
    pub total_records: usize,
    /// Rows contributed by the delta before deduplication.
    pub delta_records: usize,
    /// Rows dropped by the `(timestamp, location)` deduplication pass.
    pub duplicates_removed: usize,
    pub date_range: Option<DateRange>,
    pub distinct_locations: usize,
    pub elapsed: Duration,
}

impl ConsolidationReport {
    fn count(&self, status: LocationStatus) -> usize {
        self.locations.values().filter(|s| **s == status).count()
    }
}

impl fmt::Display for ConsolidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.up_to_date {
            write!(
                f,
                "{} store is up to date ({} records, {} locations)",
                self.granularity, self.total_records, self.distinct_locations
            )?;
        } else {
            write!(
                f,
                "{} consolidation ({}): {} records ({} delta, {} duplicates removed), {} locations",
                self.granularity,
                self.mode,
                self.total_records,
                self.delta_records,
                self.duplicates_removed,
                self.distinct_locations
            )?;
        }
        write!(
            f,
            "; {} new / {} updated / {} unchanged",
            self.count(LocationStatus::New),
            self.count(LocationStatus::Updated),
            self.count(LocationStatus::Unchanged)
        )?;
        if !self.failed_sources.is_empty() {
            write!(f, "; {} failed sources", self.failed_sources.len())?;
        }
        write!(f, "; took {:.2?}", self.elapsed)
    }
}
