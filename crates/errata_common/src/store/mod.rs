// Persistent error report storage (SQLite)

pub mod db;
pub mod reports;

pub use db::{DbLocation, ReportDb};
pub use reports::{ErrorReport, NewReport};
