// Database connection management for error reports

use crate::error::{ReportError, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How long a writer waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database location based on execution mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// System mode: /var/lib/errata/reports.db
    System,
    /// User mode: $XDG_DATA_HOME/errata/reports.db or ~/.local/share/errata/reports.db
    User,
    /// Explicit path (config or command line)
    Custom(PathBuf),
    /// Private in-memory database, gone when the handle drops
    InMemory,
}

impl DbLocation {
    pub fn path(&self) -> Result<PathBuf> {
        match self {
            DbLocation::System => Ok(PathBuf::from("/var/lib/errata/reports.db")),
            DbLocation::User => {
                let base_dir = if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
                    PathBuf::from(xdg_data)
                } else if let Ok(home) = std::env::var("HOME") {
                    PathBuf::from(home).join(".local/share")
                } else {
                    return Err(ReportError::Location(
                        "neither XDG_DATA_HOME nor HOME is set".to_string(),
                    ));
                };
                Ok(base_dir.join("errata").join("reports.db"))
            }
            DbLocation::Custom(path) => Ok(path.clone()),
            DbLocation::InMemory => Err(ReportError::Location(
                "in-memory database has no path".to_string(),
            )),
        }
    }

    /// Determine location based on current user privileges
    pub fn auto_detect() -> Self {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail
            if unsafe { libc::geteuid() } == 0 {
                return DbLocation::System;
            }
        }
        DbLocation::User
    }
}

/// SQLite handle shared by every aggregator in the process
///
/// A single connection behind an async mutex; statements run on the blocking
/// pool. Cross-process writers are coordinated by SQLite's own locking.
pub struct ReportDb {
    conn: Arc<Mutex<Connection>>,
    location: DbLocation,
}

impl ReportDb {
    /// Open or create the database at the specified location
    pub async fn open(location: DbLocation) -> Result<Self> {
        if location == DbLocation::InMemory {
            return Self::open_in_memory().await;
        }

        let db_path = location.path()?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        info!("Opening error report database at: {}", db_path.display());

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&db_path)?;

            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!("journal_mode = {}", mode);

            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.busy_timeout(BUSY_TIMEOUT)?;

            Ok(conn)
        })
        .await??;

        Self::with_connection(conn, location).await
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, DbLocation::InMemory).await
    }

    async fn with_connection(conn: Connection, location: DbLocation) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        };
        db.initialize_schema().await?;
        Ok(db)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS error_reports (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    fingerprint TEXT NOT NULL UNIQUE,
                    category TEXT NOT NULL,
                    error_message TEXT NOT NULL,
                    traceback TEXT NOT NULL,
                    context TEXT NOT NULL,
                    events INTEGER NOT NULL DEFAULT 1 CHECK (events >= 1),
                    first_occurred DATETIME NOT NULL,
                    last_occurred DATETIME NOT NULL,
                    reported BOOLEAN NOT NULL DEFAULT 0,
                    release_version TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_error_reports_reported
                    ON error_reports(reported);",
            )?;
            Ok(())
        })
        .await?;

        debug!("Error report schema ready");
        Ok(())
    }

    /// Execute a closure against the connection in a blocking context
    pub async fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await?
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }
}
