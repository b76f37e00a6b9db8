use crate::batch_source::error::BatchReadError;
use crate::consolidate::error::ConsolidateError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherVaultError {
    #[error(transparent)]
    BatchRead(#[from] BatchReadError),

    #[error(transparent)]
    Consolidate(#[from] ConsolidateError),

    #[error("Failed to create store directory '{0}'")]
    StoreDirCreation(PathBuf, #[source] std::io::Error),
}
