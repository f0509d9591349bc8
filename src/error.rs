//! Unified error hierarchy for liftrs
//!
//! Insufficient training data is never reported through these types: the
//! analyzers return `None` or an empty list instead. Errors here cover the
//! data-access boundary, configuration and import problems.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all liftrs operations
#[derive(Debug, Error)]
pub enum LiftRsError {
    /// Persistence / history access errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Set history import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised by a persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be converted back into a model type
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// CSV import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// File not found at specified path
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Row could not be parsed
    #[error("Parse error at line {line}: {reason}")]
    ParseError { line: u64, reason: String },

    /// Input contained no usable rows
    #[error("No sets found in {path}")]
    Empty { path: PathBuf },
}

/// Result type alias for liftrs operations
pub type Result<T> = std::result::Result<T, LiftRsError>;

impl From<rusqlite::Error> for LiftRsError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
                LiftRsError::Store(StoreError::Serialization(format!(
                    "column {}: {}",
                    column, source
                )))
            }
            other => LiftRsError::Store(StoreError::Sqlite(other)),
        }
    }
}

impl LiftRsError {
    /// Check if error is retryable by the data-access collaborator
    pub fn is_retryable(&self) -> bool {
        match self {
            LiftRsError::Io(_) => true,
            LiftRsError::Store(StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))) => {
                e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked
            }
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LiftRsError::Validation(_) | LiftRsError::Import(_) => ErrorSeverity::Warning,
            LiftRsError::Store(StoreError::Serialization(_)) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LiftRsError::Import(ImportError::FileNotFound { path }) => {
                format!("Could not find set history file: {}", path.display())
            }
            LiftRsError::Import(ImportError::ParseError { line, reason }) => {
                format!("Set history file has a bad row at line {}: {}", line, reason)
            }
            LiftRsError::Store(StoreError::Sqlite(_)) => {
                "Unable to read or write training data. Please check the database path.".to_string()
            }
            LiftRsError::Store(StoreError::Serialization(reason)) => {
                format!("Stored training data is unreadable ({}). The database may be damaged.", reason)
            }
            LiftRsError::Configuration(reason) => {
                format!("Invalid configuration: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Stored data is damaged
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Bad input the user can correct
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = LiftRsError::Import(ImportError::ParseError {
            line: 3,
            reason: "bad reps".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = LiftRsError::Store(StoreError::Serialization("column 0: bad".to_string()));
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = LiftRsError::Configuration("bad".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_conversion_failure_maps_to_serialization() {
        let source: Box<dyn std::error::Error + Send + Sync> = "unknown muscle group".into();
        let err = LiftRsError::from(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            source,
        ));
        assert!(matches!(err, LiftRsError::Store(StoreError::Serialization(_))));
        assert!(err.to_string().contains("unknown muscle group"));

        let err = LiftRsError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, LiftRsError::Store(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_error_retryable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(LiftRsError::from(busy).is_retryable());

        let err = LiftRsError::Validation("test".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = LiftRsError::Import(ImportError::FileNotFound {
            path: PathBuf::from("sets.csv"),
        });
        assert!(err.user_message().contains("Could not find"));

        let err = LiftRsError::Configuration("increment must be positive".to_string());
        assert!(err.user_message().contains("increment must be positive"));
    }
}
