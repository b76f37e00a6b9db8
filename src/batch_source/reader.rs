//! Discovers per-location batch files and loads them into DataFrames.

use crate::batch_source::batch::{Batch, BatchSet};
use crate::batch_source::error::BatchReadError;
use crate::types::granularity::Granularity;
use crate::types::report::SourceFailure;
use log::{info, warn};
use polars::frame::DataFrame;
use polars::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use tokio::{fs, task};

/// Reads the per-location CSV batches for a granularity from a batch
/// directory laid out as `<batch_dir>/<granularity>/<location>_<granularity>.csv`.
pub struct BatchSourceReader {
    batch_dir: PathBuf,
}

impl BatchSourceReader {
    pub fn new(batch_dir: &Path) -> Self {
        Self {
            batch_dir: batch_dir.to_path_buf(),
        }
    }

    /// Enumerates and parses every batch file for `granularity`.
    ///
    /// A file that fails to parse is skipped and recorded in the returned
    /// [`BatchSet::failures`]; it never aborts discovery of the remaining
    /// units. A missing granularity directory yields an empty set.
    pub async fn read_batches(
        &self,
        granularity: Granularity,
    ) -> Result<BatchSet, BatchReadError> {
        let dir = self.batch_dir.join(granularity.path_segment());
        let mut paths = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("No batch directory at {:?}, nothing to read", dir);
                return Ok(BatchSet::default());
            }
            Err(e) => return Err(BatchReadError::SourceDirRead(dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BatchReadError::SourceDirRead(dir.clone(), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                paths.push(path);
            }
        }
        paths.sort();
        info!(
            "Found {} {} batch files in {:?}",
            paths.len(),
            granularity,
            dir
        );

        let mut set = BatchSet::default();
        for path in paths {
            let code = location_code_for(&path, granularity);
            match Self::read_batch(path.clone(), code.clone()).await {
                Ok(batch) => {
                    info!(
                        "Read batch for {}: {} records from {:?}",
                        code,
                        batch.records.height(),
                        path
                    );
                    if let Some(displaced) = set.batches.insert(code.clone(), batch) {
                        warn!(
                            "Batch files {:?} and {:?} both map to location {}; keeping the latter",
                            displaced.path, path, code
                        );
                        set.failures.push(SourceFailure {
                            path: displaced.path,
                            reason: format!("displaced by {:?} for location code {}", path, code),
                        });
                    }
                }
                Err(err) => {
                    warn!("Skipping unreadable batch file {:?}: {}", path, err);
                    set.failures.push(SourceFailure {
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(set)
    }

    /// Parses one CSV unit in a blocking task and normalizes its key columns.
    async fn read_batch(path: PathBuf, code: String) -> Result<Batch, BatchReadError> {
        let name = humanize_code(&code);
        let worker_path = path.clone();
        let worker_code = code.clone();
        let worker_name = name.clone();
        let records = task::spawn_blocking(move || {
            let df = CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
                .try_into_reader_with_file_path(Some(worker_path.clone()))
                .map_err(|e| BatchReadError::CsvReadPolars {
                    path: worker_path.clone(),
                    source: e,
                })?
                .finish()
                .map_err(|e| BatchReadError::CsvReadPolars {
                    path: worker_path.clone(),
                    source: e,
                })?;
            normalize_columns(df, &worker_path, &worker_code, &worker_name)
        })
        .await??;

        Ok(Batch {
            location_code: code,
            location_name: name,
            path,
            records,
        })
    }
}

/// Location code of a batch file: the stem minus the granularity suffix,
/// e.g. `cape_town_hourly.csv` -> `cape_town`.
fn location_code_for(path: &Path, granularity: Granularity) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let suffix = granularity.batch_suffix();
    stem.strip_suffix(suffix.as_str()).unwrap_or(stem).to_string()
}

/// Display name derived from a location code: separators become spaces and
/// each word is title-cased, e.g. `cape_town` -> `Cape Town`.
fn humanize_code(code: &str) -> String {
    code.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes the `date` column to `Datetime(Milliseconds)` and injects the
/// `location_code` / `location_name` columns when the source lacks them.
fn normalize_columns(
    df: DataFrame,
    path: &Path,
    code: &str,
    name: &str,
) -> Result<DataFrame, BatchReadError> {
    let date_dtype = df
        .column("date")
        .map_err(|_| BatchReadError::MissingTimestampColumn(path.to_path_buf()))?
        .dtype()
        .clone();

    let date_expr = match date_dtype {
        DataType::Datetime(_, _) | DataType::Date => {
            col("date").cast(DataType::Datetime(TimeUnit::Milliseconds, None))
        }
        DataType::String => col("date").str().to_datetime(
            Some(TimeUnit::Milliseconds),
            None,
            StrptimeOptions::default(),
            lit("raise"),
        ),
        dtype => {
            return Err(BatchReadError::TimestampType {
                path: path.to_path_buf(),
                dtype,
            })
        }
    };

    let has_column = |wanted: &str| {
        df.get_column_names()
            .iter()
            .any(|column| column.as_str() == wanted)
    };
    let mut exprs = vec![date_expr];
    if !has_column("location_code") {
        exprs.push(lit(code.to_string()).alias("location_code"));
    }
    if !has_column("location_name") {
        exprs.push(lit(name.to_string()).alias("location_name"));
    }

    df.lazy()
        .with_columns(exprs)
        .collect()
        .map_err(|e| BatchReadError::TimestampParse {
            path: path.to_path_buf(),
            source: e,
        })
}
