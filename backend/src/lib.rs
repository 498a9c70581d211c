//! # Autovin - VIN enrichment for fleet asset lists
//!
//! Autovin reads a fleet asset spreadsheet, decodes every VIN through the
//! NHTSA vPIC service and sorts the vehicles for a CAN-compatibility check.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Spreadsheet │────▶│   Loader    │────▶│   Decoder   │────▶│ Classifier  │────▶│   Writer    │
//! │ (xlsx/csv)  │     │ (canonical) │     │   (vPIC)    │     │ (CAN rules) │     │ (csv/xlsx)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autovin::{process_file, ProcessOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = process_file("fleet.xlsx".as_ref(), ProcessOptions::default()).await.unwrap();
//!     println!("{} vehicles eligible", result.stats.eligible_rows);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (CanonicalRecord, DecodedResult, ClassifiedRecord)
//! - [`logs`] - Progress log (stderr + JSON-lines file)
//! - [`parser`] - CSV parsing with auto-detection
//! - [`loader`] - Workbook/CSV loading and column matching
//! - [`decoder`] - VIN decode service client
//! - [`transform`] - Extraction, classification and pipeline
//! - [`validation`] - VIN sanity checks
//! - [`writer`] - CAN CSV and processed workbook
//! - [`cache`] - Result memoization

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Input
pub mod loader;
pub mod parser;

// Remote lookups
pub mod decoder;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Output
pub mod writer;

// Caching
pub mod cache;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{CacheError, DecodeError, LoadError, PipelineError, WriteError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CanonicalRecord, ClassifiedRecord, DecodedResult, ManualCheck, ProcessStats, ValidVinRecord,
    VehicleTypeResolution,
};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use loader::{load_table, SourceTable, TargetField};
pub use parser::{parse_csv_file_auto, ParseResult};

// =============================================================================
// Re-exports - Decoder
// =============================================================================

pub use decoder::{decode_vin, parse_decode_body, DecoderClient, VinLookup};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_vin, validate_vin};

// =============================================================================
// Re-exports - Registry (Cache)
// =============================================================================

pub use cache::{ResultRegistry, StoredResult};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{classify, extract_canonical};
pub use transform::pipeline::{process_file, process_file_with, ProcessOptions, ProcessResult};
pub use writer::OutputPaths;
