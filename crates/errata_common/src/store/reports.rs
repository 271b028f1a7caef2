// Error report rows: atomic upsert and export queries

use crate::category::ErrorCategory;
use crate::error::Result;
use crate::fingerprint::{canonical_json, fingerprint};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const REPORT_COLUMNS: &str = "id, category, error_message, traceback, context, events, \
                              first_occurred, last_occurred, reported, release_version";

/// One deduplicated error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub id: i64,
    pub category: ErrorCategory,
    pub error_message: String,
    pub traceback: String,
    pub context: Value,
    /// Number of occurrences folded into this record (always >= 1)
    pub events: i64,
    pub first_occurred: DateTime<Utc>,
    pub last_occurred: DateTime<Utc>,
    /// Set once the export job has transmitted the record
    pub reported: bool,
    /// Application version that first saw the error
    pub release_version: String,
}

/// An incoming occurrence, before it is folded into storage
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub category: ErrorCategory,
    pub error_message: String,
    pub traceback: String,
    pub context: Value,
}

impl NewReport {
    pub fn new(
        category: ErrorCategory,
        error_message: impl Into<String>,
        traceback: impl Into<String>,
        context: Value,
    ) -> Self {
        Self {
            category,
            error_message: error_message.into(),
            traceback: traceback.into(),
            context,
        }
    }

    /// Deduplication fingerprint of this occurrence
    pub fn fingerprint(&self) -> String {
        fingerprint(
            self.category,
            &self.error_message,
            &self.traceback,
            &canonical_json(&self.context),
        )
    }
}

/// Column values as stored, before category and context are decoded
struct ReportRow {
    id: i64,
    category: String,
    error_message: String,
    traceback: String,
    context: String,
    events: i64,
    first_occurred: DateTime<Utc>,
    last_occurred: DateTime<Utc>,
    reported: bool,
    release_version: String,
}

impl ReportRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category: row.get(1)?,
            error_message: row.get(2)?,
            traceback: row.get(3)?,
            context: row.get(4)?,
            events: row.get(5)?,
            first_occurred: row.get(6)?,
            last_occurred: row.get(7)?,
            reported: row.get(8)?,
            release_version: row.get(9)?,
        })
    }

    fn into_report(self) -> Result<ErrorReport> {
        Ok(ErrorReport {
            id: self.id,
            category: self.category.parse()?,
            error_message: self.error_message,
            traceback: self.traceback,
            context: serde_json::from_str(&self.context)?,
            events: self.events,
            first_occurred: self.first_occurred,
            last_occurred: self.last_occurred,
            reported: self.reported,
            release_version: self.release_version,
        })
    }
}

/// Record one occurrence: insert a new row or bump the existing one
///
/// A single statement conflicts on the unique fingerprint, so concurrent
/// writers of the same error can neither create a second row nor lose an
/// increment. `first_occurred`, `reported` and `release_version` of an
/// existing row are left alone.
pub fn upsert_report(
    conn: &Connection,
    report: &NewReport,
    now: DateTime<Utc>,
    release_version: &str,
) -> Result<ErrorReport> {
    let context = canonical_json(&report.context);
    let fp = fingerprint(
        report.category,
        &report.error_message,
        &report.traceback,
        &context,
    );

    let sql = format!(
        "INSERT INTO error_reports
             (fingerprint, category, error_message, traceback, context,
              events, first_occurred, last_occurred, reported, release_version)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6, 0, ?7)
         ON CONFLICT(fingerprint) DO UPDATE SET
             events = events + 1,
             last_occurred = excluded.last_occurred
         RETURNING {}",
        REPORT_COLUMNS
    );

    let row = conn.query_row(
        &sql,
        params![
            fp,
            report.category.as_str(),
            report.error_message,
            report.traceback,
            context,
            now,
            release_version,
        ],
        ReportRow::from_row,
    )?;

    let stored = row.into_report()?;
    debug!(
        "Recorded {} error {} (events={})",
        stored.category, stored.id, stored.events
    );
    Ok(stored)
}

/// Insert a row with an explicit `reported` flag
///
/// Fails with a constraint violation if the same error is already stored.
pub fn insert_report(
    conn: &Connection,
    report: &NewReport,
    reported: bool,
    now: DateTime<Utc>,
    release_version: &str,
) -> Result<ErrorReport> {
    let context = canonical_json(&report.context);
    let fp = fingerprint(
        report.category,
        &report.error_message,
        &report.traceback,
        &context,
    );

    let sql = format!(
        "INSERT INTO error_reports
             (fingerprint, category, error_message, traceback, context,
              events, first_occurred, last_occurred, reported, release_version)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6, ?7, ?8)
         RETURNING {}",
        REPORT_COLUMNS
    );

    let row = conn.query_row(
        &sql,
        params![
            fp,
            report.category.as_str(),
            report.error_message,
            report.traceback,
            context,
            now,
            reported,
            release_version,
        ],
        ReportRow::from_row,
    )?;

    row.into_report()
}

/// All records not yet transmitted, oldest first
pub fn unreported_reports(conn: &Connection) -> Result<Vec<ErrorReport>> {
    let sql = format!(
        "SELECT {} FROM error_reports WHERE reported = 0 ORDER BY id ASC",
        REPORT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], ReportRow::from_row)?;

    let mut reports = Vec::new();
    for row in rows {
        reports.push(row?.into_report()?);
    }
    Ok(reports)
}

pub fn get_report(conn: &Connection, id: i64) -> Result<Option<ErrorReport>> {
    let sql = format!("SELECT {} FROM error_reports WHERE id = ?1", REPORT_COLUMNS);
    let row = conn
        .query_row(&sql, [id], ReportRow::from_row)
        .optional()?;

    row.map(ReportRow::into_report).transpose()
}

pub fn count_reports(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM error_reports", [], |row| row.get(0))?;
    Ok(count)
}

/// Flag records as transmitted; returns how many rows changed
///
/// Unknown ids and rows that are already reported are skipped.
pub fn mark_reported(conn: &Connection, ids: &[i64]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    {
        let mut stmt =
            tx.prepare("UPDATE error_reports SET reported = 1 WHERE id = ?1 AND reported = 0")?;
        for id in ids {
            changed += stmt.execute([id])?;
        }
    }
    tx.commit()?;

    debug!("Marked {} error reports as reported", changed);
    Ok(changed)
}
