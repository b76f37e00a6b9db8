//! The incremental consolidation engine: merges per-location record batches
//! into a canonical deduplicated, sorted table without reprocessing
//! locations whose batches hold nothing new.

use crate::batch_source::batch::{Batch, BatchSet};
use crate::consolidate::error::ConsolidateError;
use crate::consolidate::store::CanonicalStore;
use crate::types::granularity::Granularity;
use crate::types::report::{
    ConsolidationMode, ConsolidationReport, DateRange, LocationStatus,
};
use chrono::{DateTime, NaiveDateTime};
use log::{info, warn};
use polars::frame::DataFrame;
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tokio::task;

/// Consolidates one granularity's batches into its canonical store.
///
/// With `force_rebuild`, or when no store exists yet, every batch is merged
/// from scratch. Otherwise only the delta is merged: batches for locations
/// absent from the store, and batches whose newest timestamp is strictly
/// newer than the store's newest timestamp for that location. An empty delta
/// leaves the store untouched.
///
/// The merge concatenates existing rows with the delta, drops duplicate
/// `(date, location_code)` keys keeping the last occurrence (delta rows win
/// over existing rows), sorts ascending by `(date, location_code)` and
/// atomically replaces the store file.
pub async fn consolidate(
    granularity: Granularity,
    batch_set: BatchSet,
    store: &CanonicalStore,
    force_rebuild: bool,
) -> Result<ConsolidationReport, ConsolidateError> {
    let started = Instant::now();
    let BatchSet { batches, failures } = batch_set;

    let mode = if force_rebuild || !store.exists().await {
        ConsolidationMode::FullRebuild
    } else {
        ConsolidationMode::Incremental
    };
    info!("Consolidating {} data ({})", granularity, mode);

    // Store corruption must surface here rather than be mistaken for an
    // absent store; only an explicit rebuild may bypass a broken file.
    let existing = match mode {
        ConsolidationMode::FullRebuild => None,
        ConsolidationMode::Incremental => Some(store.load().await?),
    };

    let mut locations = BTreeMap::new();
    let mut delta: Vec<Batch> = Vec::new();
    match &existing {
        None => {
            for (code, batch) in batches {
                locations.insert(code, LocationStatus::New);
                delta.push(batch);
            }
        }
        Some(existing) => {
            let latest = latest_per_location(existing)?;
            for (code, batch) in batches {
                let status = match latest.get(&code) {
                    None => {
                        info!("New location: {}", code);
                        LocationStatus::New
                    }
                    Some(existing_max) => {
                        let include = match (batch.max_timestamp(), existing_max) {
                            (Ok(Some(batch_max)), Some(existing_max)) => {
                                batch_max > *existing_max
                            }
                            // Timestamps we cannot compare: reprocess the
                            // batch rather than silently drop its data.
                            (batch_max, _) => {
                                if let Err(err) = batch_max {
                                    warn!(
                                        "Could not determine newest timestamp for {}: {}",
                                        code, err
                                    );
                                }
                                true
                            }
                        };
                        if include {
                            info!("Updated data for location: {}", code);
                            LocationStatus::Updated
                        } else {
                            LocationStatus::Unchanged
                        }
                    }
                };
                if status != LocationStatus::Unchanged {
                    delta.push(batch);
                }
                locations.insert(code, status);
            }
        }
    }

    if let Some(existing) = &existing {
        if delta.is_empty() {
            info!("No new {} data to process, store is up to date", granularity);
            let (total_records, date_range, distinct_locations) = table_stats(existing)?;
            return Ok(ConsolidationReport {
                granularity,
                mode,
                up_to_date: true,
                locations,
                failed_sources: failures,
                total_records,
                delta_records: 0,
                duplicates_removed: 0,
                date_range,
                distinct_locations,
                elapsed: started.elapsed(),
            });
        }
    }

    if delta.is_empty() {
        return Err(ConsolidateError::NoBatches(granularity));
    }

    let existing_records = existing.as_ref().map_or(0, DataFrame::height);
    let delta_records: usize = delta.iter().map(|b| b.records.height()).sum();

    let mut frames = Vec::with_capacity(delta.len() + 1);
    if let Some(existing) = existing {
        frames.push(existing.lazy());
    }
    frames.extend(delta.into_iter().map(|batch| batch.records.lazy()));

    let merged = merge_and_dedup(frames).await?;
    let duplicates_removed = existing_records + delta_records - merged.height();
    if duplicates_removed > 0 {
        info!("Removed {} duplicate records", duplicates_removed);
    }

    let (total_records, date_range, distinct_locations) = table_stats(&merged)?;
    store.persist(merged).await?;
    info!(
        "Saved {} {} records to {:?}",
        total_records,
        granularity,
        store.path()
    );

    Ok(ConsolidationReport {
        granularity,
        mode,
        up_to_date: false,
        locations,
        failed_sources: failures,
        total_records,
        delta_records,
        duplicates_removed,
        date_range,
        distinct_locations,
        elapsed: started.elapsed(),
    })
}

/// Concatenates the working frames (columns unioned across sources), drops
/// duplicate `(date, location_code)` keys keeping the last occurrence and
/// sorts by the key ascending.
async fn merge_and_dedup(frames: Vec<LazyFrame>) -> Result<DataFrame, ConsolidateError> {
    let merged = concat_lf_diagonal(frames, UnionArgs::default())?
        .unique_stable(
            Some(vec!["date".into(), "location_code".into()]),
            UniqueKeepStrategy::Last,
        )
        .sort(["date", "location_code"], SortMultipleOptions::default());
    Ok(task::spawn_blocking(move || merged.collect()).await??)
}

/// Newest timestamp per location in the existing store, as epoch ms. A
/// location whose timestamps are all null maps to `None`.
fn latest_per_location(
    existing: &DataFrame,
) -> Result<HashMap<String, Option<i64>>, ConsolidateError> {
    let grouped = existing
        .clone()
        .lazy()
        .group_by([col("location_code")])
        .agg([col("date").max().alias("latest")])
        .collect()?;

    let codes = grouped.column("location_code")?.str()?;
    let latest = grouped.column("latest")?.datetime()?;
    let mut map = HashMap::with_capacity(grouped.height());
    for idx in 0..grouped.height() {
        if let Some(code) = codes.get(idx) {
            map.insert(code.to_string(), latest.get(idx));
        }
    }
    Ok(map)
}

fn table_stats(
    table: &DataFrame,
) -> Result<(usize, Option<DateRange>, usize), ConsolidateError> {
    let dates = table.column("date")?.datetime()?;
    let date_range = match (dates.min(), dates.max()) {
        (Some(min), Some(max)) => match (ms_to_naive(min), ms_to_naive(max)) {
            (Some(first), Some(last)) => Some(DateRange { first, last }),
            _ => None,
        },
        _ => None,
    };
    let distinct_locations = table.column("location_code")?.str()?.n_unique()?;
    Ok((table.height(), date_range, distinct_locations))
}

fn ms_to_naive(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}
