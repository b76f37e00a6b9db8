//! Defines the sampling interval of a dataset. Each granularity owns an
//! independent canonical store and an independent batch directory.

use serde::Serialize;
use std::fmt;

/// The sampling interval of a weather observation dataset.
///
/// Hourly and daily observations are collected and consolidated separately:
/// each granularity has its own batch source directory and its own canonical
/// Parquet store, with no shared state between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One record per location per hour.
    Hourly,
    /// One aggregated record per location per day.
    Daily,
}

impl Granularity {
    pub(crate) fn path_segment(&self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Daily => "daily",
        }
    }

    /// Suffix that batch files carry in their stem, e.g. `cape_town_hourly.csv`.
    pub(crate) fn batch_suffix(&self) -> String {
        format!("_{}", self.path_segment())
    }

    /// File name of the canonical store for this granularity.
    pub(crate) fn store_file_name(&self) -> String {
        format!("all_locations_{}.parquet", self.path_segment())
    }
}

/// Formats a `Granularity` using its `path_segment`.
///
/// ```
/// use weathervault::Granularity;
///
/// assert_eq!(format!("{}", Granularity::Hourly), "hourly");
/// assert_eq!(Granularity::Daily.to_string(), "daily");
/// ```
impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path_segment())
    }
}
