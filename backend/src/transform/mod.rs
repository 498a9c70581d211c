//! Transformation module.
//!
//! This module turns the source table into the output rows:
//! - Extractor: source rows to canonical records
//! - Classifier: eligibility, manual checks, vehicle-type backfill
//! - Pipeline: load, decode, classify, write

pub mod classifier;
pub mod extractor;
pub mod pipeline;

pub use classifier::{classify, Classification};
pub use extractor::extract_canonical;
pub use pipeline::*;
