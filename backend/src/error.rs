//! Error types for the autovin pipeline.
//!
//! One enum per stage, converted into [`PipelineError`] through `From`
//! so `?` works across stage boundaries:
//!
//! - [`LoadError`] - spreadsheet/CSV loading and column mapping
//! - [`DecodeError`] - remote VIN lookups
//! - [`WriteError`] - output file generation
//! - [`CacheError`] - result registry persistence
//! - [`PipelineError`] - top-level orchestration

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while reading the input spreadsheet.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Extension is neither a workbook nor a CSV file.
    #[error("Unsupported input file: {0}")]
    UnsupportedFormat(PathBuf),

    /// Workbook could not be opened or a sheet could not be read.
    #[error("Workbook error: {0}")]
    Workbook(String),

    /// Multi-sheet workbook without the expected asset sheet.
    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    /// Workbook has no sheets at all.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// Sheet is shorter than the header offset.
    #[error("Header row {row} is beyond the last row of the sheet ({rows} rows)")]
    MissingHeader { row: usize, rows: usize },

    /// No header matches "vin".
    #[error("No VIN column found in headers: {0:?}")]
    MissingVinColumn(Vec<String>),

    /// Invalid CSV input.
    #[error("Invalid CSV format: {0}")]
    Csv(String),
}

// =============================================================================
// Decoder Errors
// =============================================================================

/// Errors from the VIN decode service.
///
/// A body that is not valid JSON is not an error: it is recorded as an
/// "Error" row by the decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Request exceeded the client timeout.
    #[error("Timed out")]
    Timeout,

    /// Transport failure other than a timeout.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Base URL cannot carry a VIN path segment.
    #[error("Invalid decoder URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for DecodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DecodeError::Timeout
        } else {
            DecodeError::Request(err.to_string())
        }
    }
}

// =============================================================================
// Writer Errors
// =============================================================================

/// Errors while writing output files.
#[derive(Debug, Error)]
pub enum WriteError {
    /// IO error.
    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook generation error.
    #[error("Workbook write error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors from the result registry.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Entry not found.
    #[error("Cached result not found: {0}")]
    NotFound(String),

    /// IO error.
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error returned by [`crate::transform::pipeline::process_file`].
/// A timeout on any lookup surfaces as [`PipelineError::TimedOut`], whose
/// message is the literal `Timed out`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// A VIN lookup exceeded the client timeout; nothing was written.
    #[error("Timed out")]
    TimedOut,

    /// A VIN lookup failed for another reason.
    #[error("Decode error: {0}")]
    Decode(DecodeError),

    /// Output files could not be written.
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Result registry error.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Timeout => PipelineError::TimedOut,
            other => PipelineError::Decode(other),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for decoder operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for writer operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_becomes_timed_out() {
        let pipeline_err: PipelineError = DecodeError::Timeout.into();
        assert!(matches!(pipeline_err, PipelineError::TimedOut));
        assert_eq!(pipeline_err.to_string(), "Timed out");
    }

    #[test]
    fn test_error_conversion_chain() {
        let load_err = LoadError::MissingSheet("Vehicle & Asset List".into());
        let pipeline_err: PipelineError = load_err.into();
        assert!(pipeline_err.to_string().contains("Vehicle & Asset List"));

        let decode_err = DecodeError::Request("connection refused".into());
        let pipeline_err: PipelineError = decode_err.into();
        assert!(matches!(pipeline_err, PipelineError::Decode(_)));
        assert!(pipeline_err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_missing_header_format() {
        let err = LoadError::MissingHeader { row: 3, rows: 2 };
        let msg = err.to_string();
        assert!(msg.contains("Header row 3"));
        assert!(msg.contains("2 rows"));
    }
}
