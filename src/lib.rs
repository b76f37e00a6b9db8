mod batch_source;
mod consolidate;
mod error;
mod status;
mod types;
mod vault;

pub use error::WeatherVaultError;
pub use vault::WeatherVault;

pub use batch_source::batch::{Batch, BatchSet};
pub use batch_source::error::BatchReadError;
pub use batch_source::reader::BatchSourceReader;

pub use consolidate::engine::consolidate;
pub use consolidate::error::ConsolidateError;
pub use consolidate::store::CanonicalStore;

pub use status::{LocationCoverage, StoreStatus};
pub use types::granularity::Granularity;
pub use types::report::{
    ConsolidationMode, ConsolidationReport, DateRange, LocationStatus, SourceFailure,
};
