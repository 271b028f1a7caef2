//! Error categories
//!
//! The category decides what shape the report context has: browser and device
//! info for frontend errors, request/server/package info for backend errors,
//! job and worker info for background task errors.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Client-side (browser) errors
    Frontend,
    /// Server-side request handling errors
    Backend,
    /// Background job errors
    Task,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Frontend => "frontend",
            ErrorCategory::Backend => "backend",
            ErrorCategory::Task => "task",
        }
    }

    pub fn all() -> [ErrorCategory; 3] {
        [
            ErrorCategory::Frontend,
            ErrorCategory::Backend,
            ErrorCategory::Task,
        ]
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "frontend" => Ok(ErrorCategory::Frontend),
            "backend" => Ok(ErrorCategory::Backend),
            "task" => Ok(ErrorCategory::Task),
            _ => Err(ReportError::UnknownCategory(s.to_string())),
        }
    }
}
