pub mod granularity;
pub mod report;
