//! Error types for the data-loader crate.
//!
//! Every failure while reading the catalog or the ratings file ends up as a
//! `DataLoadError`. The `#[error(...)]` attributes give each variant a message
//! that already carries the file and line it came from.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during data loading and parsing
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// No catalog file was found in the data directory
    #[error("No catalog file found in {dir} (expected movies.csv or movies.dat)")]
    CatalogNotFound { dir: PathBuf },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    ///
    /// This variant stores context about where the error occurred
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// A rating scale whose bounds are not ordered or not finite
    #[error("Invalid rating scale [{min}, {max}]")]
    InvalidScale { min: f64, max: f64 },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
