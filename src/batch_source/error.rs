use polars::error::PolarsError;
use polars::prelude::DataType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchReadError {
    #[error("Failed to read batch directory '{0}'")]
    SourceDirRead(PathBuf, #[source] std::io::Error),

    #[error("Parsing error reading batch file '{path}'")]
    CsvReadPolars {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Batch file '{0}' has no 'date' column")]
    MissingTimestampColumn(PathBuf),

    #[error("Unsupported dtype {dtype} for 'date' column in batch file '{path}'")]
    TimestampType { path: PathBuf, dtype: DataType },

    #[error("Failed to parse timestamps in batch file '{path}'")]
    TimestampParse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing batch DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
