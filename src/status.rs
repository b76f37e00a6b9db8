//! Read-only coverage reporting over a canonical store, for "what have we
//! collected so far" checks. Uses key-column scans only, so it never touches
//! the measurement columns.

use crate::consolidate::error::ConsolidateError;
use crate::consolidate::store::CanonicalStore;
use crate::types::granularity::Granularity;
use crate::types::report::DateRange;
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;

/// Coverage summary of one canonical store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub granularity: Granularity,
    pub path: PathBuf,
    pub file_size_bytes: u64,
    pub total_records: usize,
    pub date_range: Option<DateRange>,
    /// Per-location coverage, sorted by location code.
    pub locations: Vec<LocationCoverage>,
}

/// Record count and newest timestamp for one location in a store.
#[derive(Debug, Clone, Serialize)]
pub struct LocationCoverage {
    pub location_code: String,
    pub records: usize,
    pub latest_timestamp: Option<NaiveDateTime>,
}

/// Summarizes a canonical store, or returns `None` when no store exists yet.
pub(crate) async fn store_status(
    granularity: Granularity,
    store: &CanonicalStore,
) -> Result<Option<StoreStatus>, ConsolidateError> {
    if !store.exists().await {
        return Ok(None);
    }
    let path = store.path().to_path_buf();
    let file_size_bytes = fs::metadata(&path)
        .await
        .map_err(|e| ConsolidateError::StoreMetadata(path.clone(), e))?
        .len();

    let keys = store.scan_key_columns().await?;
    let per_location = keys
        .lazy()
        .group_by([col("location_code")])
        .agg([
            len().alias("records"),
            col("date").min().alias("earliest"),
            col("date").max().alias("latest"),
        ])
        .sort(["location_code"], SortMultipleOptions::default())
        .collect()?;

    let codes = per_location.column("location_code")?.str()?;
    let counts = per_location.column("records")?.u32()?;
    let earliest = per_location.column("earliest")?.datetime()?;
    let latest = per_location.column("latest")?.datetime()?;

    let mut locations = Vec::with_capacity(per_location.height());
    let mut total_records = 0usize;
    let mut first_ms: Option<i64> = None;
    let mut last_ms: Option<i64> = None;
    for idx in 0..per_location.height() {
        let Some(code) = codes.get(idx) else { continue };
        let records = counts.get(idx).unwrap_or(0) as usize;
        total_records += records;
        let latest_ms = latest.get(idx);
        if let Some(ms) = latest_ms {
            last_ms = Some(last_ms.map_or(ms, |current| current.max(ms)));
        }
        if let Some(ms) = earliest.get(idx) {
            first_ms = Some(first_ms.map_or(ms, |current| current.min(ms)));
        }
        locations.push(LocationCoverage {
            location_code: code.to_string(),
            records,
            latest_timestamp: latest_ms.and_then(ms_to_naive),
        });
    }

    let date_range = match (first_ms.and_then(ms_to_naive), last_ms.and_then(ms_to_naive)) {
        (Some(first), Some(last)) => Some(DateRange { first, last }),
        _ => None,
    };

    Ok(Some(StoreStatus {
        granularity,
        path,
        file_size_bytes,
        total_records,
        date_range,
        locations,
    }))
}

fn ms_to_naive(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}
