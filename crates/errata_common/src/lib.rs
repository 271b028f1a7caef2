//! Errata Common - Error report aggregation
//!
//! Repeated runtime errors (frontend, backend, background task) collapse into
//! one persistent record with an event counter and first/last occurrence
//! timestamps. Unreported records are handed to an export job.

pub mod aggregator;
pub mod category;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod store;

pub use aggregator::{AggregatorSettings, ErrorAggregator};
pub use category::ErrorCategory;
pub use config::{DevConfig, ErrataConfig, StorageConfig};
pub use error::{ReportError, Result};
pub use store::{DbLocation, ErrorReport, NewReport, ReportDb};
