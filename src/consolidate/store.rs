use crate::consolidate::error::ConsolidateError;
use crate::types::granularity::Granularity;
use polars::frame::DataFrame;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::{fs, task};

/// Handle to the canonical Parquet store of one granularity: the single
/// deduplicated, sorted table spanning all locations.
///
/// The store is only ever replaced whole. [`CanonicalStore::persist`] writes
/// to a temporary file in the same directory and swaps it over the canonical
/// path, so readers never observe a partially written table and a failed
/// write leaves the previous store intact.
pub struct CanonicalStore {
    path: PathBuf,
}

impl CanonicalStore {
    pub fn new(store_dir: &Path, granularity: Granularity) -> Self {
        Self {
            path: store_dir.join(granularity.store_file_name()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Loads the full store table. A failure here means the store is corrupt
    /// or unreadable, which is fatal for incremental consolidation; it is
    /// deliberately not treated as "store absent".
    pub async fn load(&self) -> Result<DataFrame, ConsolidateError> {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            LazyFrame::scan_parquet(&path, ScanArgsParquet::default())
                .and_then(LazyFrame::collect)
                .map_err(|e| ConsolidateError::StoreLoad(path.clone(), e))
        })
        .await?
    }

    /// Lazily scans only the key columns (`date`, `location_code`) so that
    /// membership and coverage questions never read the measurement columns.
    pub async fn scan_key_columns(&self) -> Result<DataFrame, ConsolidateError> {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            LazyFrame::scan_parquet(&path, ScanArgsParquet::default())
                .map_err(|e| ConsolidateError::StoreLoad(path.clone(), e))?
                .select([col("date"), col("location_code")])
                .collect()
                .map_err(|e| ConsolidateError::StoreLoad(path.clone(), e))
        })
        .await?
    }

    /// Location codes currently present in the store, via a key-column scan.
    pub async fn existing_locations(&self) -> Result<Vec<String>, ConsolidateError> {
        let path = self.path.clone();
        let df = task::spawn_blocking(move || {
            LazyFrame::scan_parquet(&path, ScanArgsParquet::default())
                .map_err(|e| ConsolidateError::StoreLoad(path.clone(), e))?
                .select([col("location_code")])
                .unique_stable(None, UniqueKeepStrategy::First)
                .sort(["location_code"], SortMultipleOptions::default())
                .collect()
                .map_err(|e| ConsolidateError::StoreLoad(path.clone(), e))
        })
        .await??;

        let codes = df.column("location_code")?.str()?;
        Ok(codes
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect())
    }

    /// Atomically replaces the store with `table`: parquet-encode into a
    /// temporary file next to the store, then rename over the canonical path.
    pub async fn persist(&self, table: DataFrame) -> Result<(), ConsolidateError> {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut table = table;
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let mut swap_file = NamedTempFile::new_in(dir)
                .map_err(|e| ConsolidateError::PersistIo(path.clone(), e))?;
            ParquetWriter::new(swap_file.as_file_mut())
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut table)
                .map_err(|e| ConsolidateError::PersistEncode(path.clone(), e))?;
            swap_file
                .persist(&path)
                .map_err(|e| ConsolidateError::PersistIo(path.clone(), e.error))?;
            Ok(())
        })
        .await?
    }
}
