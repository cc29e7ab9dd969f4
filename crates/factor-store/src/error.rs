//! Error types for the factor-store crate.
//!
//! A missing artifact is not an error here: `FactorStore::load` reports it as
//! `Availability::Unavailable`. Everything below means the artifacts exist
//! but cannot be trusted, and is surfaced to the caller as-is.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactorStoreError {
    /// Opening, mapping, reading or writing a file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An `.npy` file whose header or length cannot be used
    #[error("Malformed array {path}: {reason}")]
    MalformedArray { path: PathBuf, reason: String },

    /// A mapping or model file that is not the JSON we expect
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Raw→inner table that is not injective or not dense
    #[error("Malformed {namespace} id mapping: {reason}")]
    MalformedMapping { namespace: String, reason: String },

    /// Arrays that disagree on item count or factor count
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, FactorStoreError>;

/// Attach the offending path to an I/O error
pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FactorStoreError + '_ {
    move |source| FactorStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
