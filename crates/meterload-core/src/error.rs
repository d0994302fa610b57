//! Error types for meterload-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in meterload-core
///
/// Cell-level problems (unparseable numbers, unresolvable timestamps) are
/// never reported here; they are recovered where they happen.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file could not be decoded as a workbook
    #[error("failed to open workbook '{path}': {message}")]
    Workbook { path: PathBuf, message: String },

    /// The workbook has no sheet to read
    #[error("workbook '{0}' contains no sheets")]
    EmptyWorkbook(PathBuf),

    /// File extension is not a known spreadsheet format
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Loading a single source took longer than the configured limit
    #[error("reading '{path}' timed out after {seconds}s")]
    ReadTimeout { path: PathBuf, seconds: u64 },

    /// A background load task panicked or was cancelled
    #[error("import task failed: {0}")]
    Task(String),

    /// Merging produced zero readings, usually a wrong mapping
    #[error("no valid data found")]
    NoValidData,

    /// A mapping or job file is structurally wrong
    #[error("invalid mapping: {0}")]
    InvalidMapping(String),

    /// A project snapshot could not be restored
    #[error("failed to load project '{path}': {message}")]
    ProjectLoad { path: PathBuf, message: String },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
