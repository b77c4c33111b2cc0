/*!
 * Error types for geobatch
 */

use std::fmt;
use std::io;

use crate::catalog::CatalogError;
use crate::core::settings::ValidationError;

pub type Result<T> = std::result::Result<T, GeobatchError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Errors that stop a batch (or a CLI command) as a whole.
///
/// Per-file pipeline failures are deliberately absent: they are carried as
/// [`crate::core::pipeline::StageError`] values inside each outcome and never
/// surface through this type.
#[derive(Debug)]
pub enum GeobatchError {
    /// Batch request rejected before any file was touched
    Validation(ValidationError),

    /// Catalog could not be built or queried outside of a batch
    Catalog(CatalogError),

    /// I/O error
    Io(io::Error),

    /// Configuration error
    Config(String),

    /// Worker pool could not be started
    Parallel(String),

    /// Generic error with message
    Other(String),
}

impl GeobatchError {
    /// Get the process exit code for this error.
    ///
    /// A batch that ran with failed files is not an error; the CLI maps that
    /// case to [`EXIT_PARTIAL`] from the batch counts instead.
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }

    /// True when the caller's request was at fault rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GeobatchError::Validation(_) | GeobatchError::Config(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            GeobatchError::Validation(_) => ErrorCategory::Validation,
            GeobatchError::Catalog(_) => ErrorCategory::Catalog,
            GeobatchError::Io(_) => ErrorCategory::IoError,
            GeobatchError::Config(_) => ErrorCategory::Configuration,
            GeobatchError::Parallel(_) => ErrorCategory::Concurrency,
            GeobatchError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Batch request validation errors
    Validation,
    /// Reference catalog errors
    Catalog,
    /// I/O operation errors
    IoError,
    /// Configuration errors
    Configuration,
    /// Worker pool errors
    Concurrency,
    /// Uncategorized errors
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Catalog => write!(f, "catalog"),
            ErrorCategory::IoError => write!(f, "io"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for GeobatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeobatchError::Validation(err) => write!(f, "Batch rejected: {}", err),
            GeobatchError::Catalog(err) => write!(f, "Catalog error: {}", err),
            GeobatchError::Io(err) => write!(f, "I/O error: {}", err),
            GeobatchError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GeobatchError::Parallel(msg) => write!(f, "Parallel processing error: {}", msg),
            GeobatchError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for GeobatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeobatchError::Validation(err) => Some(err),
            GeobatchError::Catalog(err) => Some(err),
            GeobatchError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for GeobatchError {
    fn from(err: io::Error) -> Self {
        GeobatchError::Io(err)
    }
}

impl From<serde_json::Error> for GeobatchError {
    fn from(err: serde_json::Error) -> Self {
        GeobatchError::Config(format!("JSON parse error: {}", err))
    }
}

impl From<ValidationError> for GeobatchError {
    fn from(err: ValidationError) -> Self {
        GeobatchError::Validation(err)
    }
}

impl From<CatalogError> for GeobatchError {
    fn from(err: CatalogError) -> Self {
        GeobatchError::Catalog(err)
    }
}
