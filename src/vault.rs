//! The main entry point for consolidating weather observation batches. A
//! `WeatherVault` owns two directory paths and composes the batch source
//! reader, the consolidation engine and the canonical stores behind a small
//! builder API.

use crate::batch_source::reader::BatchSourceReader;
use crate::consolidate::engine::consolidate;
use crate::consolidate::store::CanonicalStore;
use crate::error::WeatherVaultError;
use crate::status::{store_status, StoreStatus};
use crate::types::granularity::Granularity;
use crate::types::report::ConsolidationReport;
use bon::bon;
use std::io;
use std::path::PathBuf;
use tokio::fs;

/// Client for turning per-location batch files into canonical Parquet stores.
///
/// `batch_dir` is the discovery root: batches live in
/// `<batch_dir>/hourly/*.csv` and `<batch_dir>/daily/*.csv`. `store_dir`
/// holds one canonical Parquet store per granularity. A vault carries no
/// other state; each consolidation run is independent.
///
/// # Examples
///
/// ```no_run
/// # use weathervault::{Granularity, WeatherVault, WeatherVaultError};
/// # #[tokio::main]
/// # async fn main() -> Result<(), WeatherVaultError> {
/// let vault = WeatherVault::builder()
///     .batch_dir("data/raw/historical".into())
///     .store_dir("data/processed".into())
///     .build()
///     .await?;
///
/// let report = vault.consolidate(Granularity::Hourly).call().await?;
/// println!("{report}");
/// # Ok(())
/// # }
/// ```
pub struct WeatherVault {
    batch_dir: PathBuf,
    store_dir: PathBuf,
}

#[bon]
impl WeatherVault {
    /// Creates a vault, creating the store directory if needed. The batch
    /// directory may be absent; reading it then yields empty batch sets.
    #[builder]
    pub async fn new(batch_dir: PathBuf, store_dir: PathBuf) -> Result<Self, WeatherVaultError> {
        match fs::metadata(&store_dir).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&store_dir)
                    .await
                    .map_err(|e| WeatherVaultError::StoreDirCreation(store_dir.clone(), e))?;
            }
            Err(e) => return Err(WeatherVaultError::StoreDirCreation(store_dir.clone(), e)),
        }
        Ok(Self {
            batch_dir,
            store_dir,
        })
    }

    /// Runs one consolidation pass for a granularity.
    ///
    /// Reads the currently available batches, merges the new/updated ones
    /// into the canonical store and returns the run report. Set
    /// `.force_rebuild(true)` to ignore any existing store and rebuild it
    /// from every batch; this is also the recovery path when an existing
    /// store fails to load.
    #[builder(start_fn = consolidate)]
    pub async fn run_consolidation(
        &self,
        #[builder(start_fn)] granularity: Granularity,
        force_rebuild: Option<bool>,
    ) -> Result<ConsolidationReport, WeatherVaultError> {
        let reader = BatchSourceReader::new(&self.batch_dir);
        let batches = reader.read_batches(granularity).await?;
        let store = self.store(granularity);
        let report = consolidate(
            granularity,
            batches,
            &store,
            force_rebuild.unwrap_or(false),
        )
        .await?;
        Ok(report)
    }

    /// Consolidates both granularities concurrently. The hourly and daily
    /// stores are fully independent, so the two runs share no state.
    pub async fn consolidate_all(
        &self,
        force_rebuild: bool,
    ) -> Result<Vec<ConsolidationReport>, WeatherVaultError> {
        let (hourly, daily) = tokio::try_join!(
            self.consolidate(Granularity::Hourly)
                .force_rebuild(force_rebuild)
                .call(),
            self.consolidate(Granularity::Daily)
                .force_rebuild(force_rebuild)
                .call(),
        )?;
        Ok(vec![hourly, daily])
    }

    /// Coverage summary of a granularity's canonical store, or `None` when
    /// nothing has been consolidated yet.
    pub async fn status(
        &self,
        granularity: Granularity,
    ) -> Result<Option<StoreStatus>, WeatherVaultError> {
        let store = self.store(granularity);
        Ok(store_status(granularity, &store).await?)
    }

    /// Handle to the canonical store for `granularity`.
    pub fn store(&self, granularity: Granularity) -> CanonicalStore {
        CanonicalStore::new(&self.store_dir, granularity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::report::{ConsolidationMode, LocationStatus};
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn write_batch(root: &TempDir, granularity: Granularity, file: &str, contents: &str) {
        let dir = root.path().join("raw").join(granularity.path_segment());
        create_dir_all(&dir).unwrap();
        write(dir.join(file), contents).unwrap();
    }

    async fn vault_in(root: &TempDir) -> WeatherVault {
        WeatherVault::builder()
            .batch_dir(root.path().join("raw"))
            .store_dir(root.path().join("processed"))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn consolidates_both_granularities_end_to_end() {
        let root = TempDir::new().unwrap();
        write_batch(
            &root,
            Granularity::Hourly,
            "cape_town_hourly.csv",
            "date,temp\n2024-06-01T00:00:00,14.0\n2024-06-01T01:00:00,13.5\n",
        );
        write_batch(
            &root,
            Granularity::Daily,
            "cape_town_daily.csv",
            "date,tmax\n2024-06-01,17.0\n",
        );

        let vault = vault_in(&root).await;
        let reports = vault.consolidate_all(false).await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports
            .iter()
            .all(|r| r.mode == ConsolidationMode::FullRebuild));
        assert!(vault.store(Granularity::Hourly).exists().await);
        assert!(vault.store(Granularity::Daily).exists().await);

        // Second pass with unchanged batches is a no-op.
        let reports = vault.consolidate_all(false).await.unwrap();
        assert!(reports.iter().all(|r| r.up_to_date));
    }

    #[tokio::test]
    async fn failed_source_does_not_block_other_locations() {
        let root = TempDir::new().unwrap();
        write_batch(
            &root,
            Granularity::Hourly,
            "cape_town_hourly.csv",
            "date,temp\n2024-06-01T00:00:00,14.0\n",
        );
        write_batch(
            &root,
            Granularity::Hourly,
            "durban_hourly.csv",
            "date,temp\n2024-06-01T00:00:00,21.0,too,many,fields\n",
        );

        let vault = vault_in(&root).await;
        let report = vault
            .consolidate(Granularity::Hourly)
            .call()
            .await
            .unwrap();

        assert_eq!(report.locations["cape_town"], LocationStatus::New);
        assert!(!report.locations.contains_key("durban"));
        assert_eq!(report.failed_sources.len(), 1);
        assert!(vault.store(Granularity::Hourly).exists().await);
    }

    #[tokio::test]
    async fn status_reflects_consolidated_store() {
        let root = TempDir::new().unwrap();
        write_batch(
            &root,
            Granularity::Daily,
            "cape_town_daily.csv",
            "date,tmax\n2024-06-01,17.0\n2024-06-02,18.5\n",
        );

        let vault = vault_in(&root).await;
        assert!(vault.status(Granularity::Daily).await.unwrap().is_none());

        vault.consolidate(Granularity::Daily).call().await.unwrap();
        let status = vault.status(Granularity::Daily).await.unwrap().unwrap();
        assert_eq!(status.total_records, 2);
        assert_eq!(status.locations[0].location_code, "cape_town");
    }

    #[tokio::test]
    async fn force_rebuild_discards_stale_rows() {
        let root = TempDir::new().unwrap();
        write_batch(
            &root,
            Granularity::Daily,
            "cape_town_daily.csv",
            "date,tmax\n2024-06-01,17.0\n2024-06-02,18.5\n",
        );
        let vault = vault_in(&root).await;
        vault.consolidate(Granularity::Daily).call().await.unwrap();

        // Shrink the source, then rebuild: the store must match the batch
        // exactly instead of keeping the union.
        write_batch(
            &root,
            Granularity::Daily,
            "cape_town_daily.csv",
            "date,tmax\n2024-06-01,17.0\n",
        );
        let report = vault
            .consolidate(Granularity::Daily)
            .force_rebuild(true)
            .call()
            .await
            .unwrap();
        assert_eq!(report.mode, ConsolidationMode::FullRebuild);
        assert_eq!(report.total_records, 1);
    }
}
