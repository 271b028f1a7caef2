//! Error Aggregator
//!
//! Folds repeated occurrences of the same error into one stored record and
//! hands unreported records to the export job. Developer mode turns
//! collection off entirely.

use crate::category::ErrorCategory;
use crate::error::Result;
use crate::store::reports::{self, ErrorReport, NewReport};
use crate::store::ReportDb;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Settings fixed at construction time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorSettings {
    /// Skip persistence (local development)
    pub developer_mode: bool,
    /// Version stamped on newly created records
    pub release_version: String,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            developer_mode: false,
            release_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub struct ErrorAggregator {
    db: Arc<ReportDb>,
    settings: AggregatorSettings,
}

impl ErrorAggregator {
    pub fn new(db: Arc<ReportDb>, settings: AggregatorSettings) -> Self {
        Self { db, settings }
    }

    pub fn is_developer_mode(&self) -> bool {
        self.settings.developer_mode
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Record one occurrence of an error
    ///
    /// Returns `None` without touching storage in developer mode. Otherwise
    /// returns the record after the occurrence was folded in: `events == 1`
    /// for a new error, incremented with a fresh `last_occurred` for a repeat.
    pub async fn insert_or_update_error(
        &self,
        category: ErrorCategory,
        error_message: impl Into<String>,
        traceback: impl Into<String>,
        context: Value,
    ) -> Result<Option<ErrorReport>> {
        if self.settings.developer_mode {
            info!("Developer mode is on, {} error not recorded", category);
            return Ok(None);
        }

        let report = NewReport::new(category, error_message, traceback, context);
        let release_version = self.settings.release_version.clone();

        let stored = self
            .db
            .execute(move |conn| reports::upsert_report(conn, &report, Utc::now(), &release_version))
            .await?;

        Ok(Some(stored))
    }

    /// All records with `reported == false`, ordered by id
    pub async fn get_unreported_errors(&self) -> Result<Vec<ErrorReport>> {
        let unreported = self.db.execute(reports::unreported_reports).await?;
        debug!("{} unreported error reports", unreported.len());
        Ok(unreported)
    }

    /// Flag records as transmitted after a successful export
    pub async fn mark_reported(&self, ids: Vec<i64>) -> Result<usize> {
        let changed = self
            .db
            .execute(move |conn| reports::mark_reported(conn, &ids))
            .await?;

        info!("Marked {} error reports as reported", changed);
        Ok(changed)
    }
}
