//! Error type for report storage and aggregation

/// Errors raised while recording or reading error reports
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid report context: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown error category: '{0}'. Valid values: frontend, backend, task")]
    UnknownCategory(String),

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine database location: {0}")]
    Location(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
