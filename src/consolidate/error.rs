use crate::types::granularity::Granularity;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsolidateError {
    /// The existing canonical store could not be read. This is fatal for an
    /// incremental run; a full rebuild must be requested explicitly.
    #[error("Failed to load canonical store '{0}'; request a full rebuild to recover")]
    StoreLoad(PathBuf, #[source] PolarsError),

    #[error("Failed to read metadata for canonical store '{0}'")]
    StoreMetadata(PathBuf, #[source] std::io::Error),

    // Errors during the write-then-swap persist step. The prior store file is
    // left untouched when any of these occur.
    #[error("I/O error writing canonical store '{0}'")]
    PersistIo(PathBuf, #[source] std::io::Error),
    #[error("Encoding error writing canonical store '{0}'")]
    PersistEncode(PathBuf, #[source] PolarsError),

    #[error("No readable batches to build the {0} canonical store from")]
    NoBatches(Granularity),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
