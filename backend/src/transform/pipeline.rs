//! High-level pipeline API: spreadsheet in, CAN file and processed workbook out.
//!
//! Steps, in order:
//! 1. Load the asset table and extract canonical records
//! 2. Decode each VIN, strictly one after the other
//! 3. Classify the decoded rows
//! 4. Write both output files next to the input
//!
//! A timeout on any lookup aborts the run before anything is written.
//!
//! # Example
//!
//! ```rust,ignore
//! use autovin::transform::pipeline::{process_file, ProcessOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = process_file(Path::new("fleet.xlsx"), ProcessOptions::default()).await?;
//!     println!("CAN file: {}", result.outputs.can.display());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::classifier::{classify, current_year, Classification};
use super::extractor::extract_canonical;
use crate::cache::{
    fingerprint, FingerprintInput, OutputDigests, ResultRegistry, StoredResult, DEFAULT_REGISTRY_DIR,
};
use crate::decoder::{decode_vin, DecoderClient, VinLookup};
use crate::error::{LoadError, PipelineResult};
use crate::loader::{load_table, DEFAULT_HEADER_ROW};
use crate::logs::{log_info, log_info_indent, log_success, log_warning, log_warning_indent};
use crate::models::{CanonicalRecord, DecodedResult, ProcessStats};
use crate::validation::validate_vin;
use crate::writer::{write_outputs, OutputPaths};

/// Options for one pipeline run
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Zero-based row of the header in the source sheet
    pub header_row: usize,

    /// Year vehicle age is measured against (current year when unset)
    pub reference_year: Option<i32>,

    /// Skip the result cache entirely
    pub no_cache: bool,

    /// Directory of the result cache
    pub cache_dir: PathBuf,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            header_row: DEFAULT_HEADER_ROW,
            reference_year: None,
            no_cache: false,
            cache_dir: PathBuf::from(DEFAULT_REGISTRY_DIR),
        }
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    /// Files written (or reused from cache)
    pub outputs: OutputPaths,

    /// Run counters
    pub stats: ProcessStats,

    /// Whether the outputs came from the result cache
    pub cached: bool,
}

/// Process a spreadsheet against the decode service configured in the environment.
pub async fn process_file(path: &Path, options: ProcessOptions) -> PipelineResult<ProcessResult> {
    let client = DecoderClient::from_env()?;
    process_file_with(path, options, &client).await
}

/// Process a spreadsheet with an explicit lookup source.
pub async fn process_file_with<L: VinLookup>(
    path: &Path,
    options: ProcessOptions,
    lookup: &L,
) -> PipelineResult<ProcessResult> {
    let reference_year = options.reference_year.unwrap_or_else(current_year);

    let content = std::fs::read(path).map_err(LoadError::from)?;
    let decoder = lookup.source_id();
    let id = fingerprint(&FingerprintInput {
        input_path: path,
        content: &content,
        decoder: &decoder,
        header_row: options.header_row,
        reference_year,
    });

    let mut registry = if options.no_cache {
        None
    } else {
        Some(ResultRegistry::with_dir(&options.cache_dir))
    };

    if let Some(stored) = registry.as_mut().and_then(|r| r.lookup(&id)) {
        log_success(format!("♻️  Reusing cached result {}", short_id(&stored.id)));
        log_info_indent(format!("Created: {}", stored.created_at), 1);
        return Ok(ProcessResult {
            outputs: stored.outputs,
            stats: stored.stats,
            cached: true,
        });
    }

    // Step 1: Load
    let table = load_table(path, options.header_row)?;
    let records = extract_canonical(&table);
    log_success(format!(
        "{} rows with a VIN out of {}",
        records.len(),
        table.rows.len()
    ));

    let mut stats = ProcessStats {
        source_rows: table.rows.len(),
        canonical_rows: records.len(),
        suspect_vins: report_suspect_vins(&records),
        ..Default::default()
    };

    // Step 2: Decode
    log_info(format!("🔎 Decoding {} VINs via {}...", records.len(), decoder));
    let decoded = decode_all(records, lookup).await?;
    stats.decode_errors = decoded.iter().filter(|(_, d)| d.is_error()).count();
    stats.decoded_rows = decoded.len() - stats.decode_errors;
    if stats.decode_errors > 0 {
        log_warning(format!("{} VINs returned no usable information", stats.decode_errors));
    }

    // Step 3: Classify
    log_info(format!("⚙️  Classifying against {}...", reference_year));
    let classification = classify(decoded, reference_year);
    report_classification(&classification, &mut stats);

    // Step 4: Write
    log_info("💾 Writing outputs...");
    let outputs = write_outputs(&classification.records, &classification.valid, path)?;
    log_success(format!("CAN file: {}", outputs.can.display()));
    log_success(format!("Processed workbook: {}", outputs.processed.display()));

    if let Some(registry) = registry.as_mut() {
        let saved = OutputDigests::compute(&outputs).and_then(|digests| {
            registry.save(StoredResult {
                id: id.clone(),
                input_path: path.display().to_string(),
                outputs: outputs.clone(),
                digests,
                stats: stats.clone(),
                decoder,
                reference_year,
                created_at: chrono::Utc::now().to_rfc3339(),
            })
        });
        match saved {
            Ok(()) => log_info(format!("→ Cached as: {}", short_id(&id))),
            Err(e) => log_warning(format!("Could not cache result: {}", e)),
        }
    }

    Ok(ProcessResult {
        outputs,
        stats,
        cached: false,
    })
}

/// Decode every record in order, one lookup in flight at a time.
async fn decode_all<L: VinLookup>(
    records: Vec<CanonicalRecord>,
    lookup: &L,
) -> PipelineResult<Vec<(CanonicalRecord, DecodedResult)>> {
    let total = records.len();
    let mut decoded = Vec::with_capacity(total);

    for (i, record) in records.into_iter().enumerate() {
        let result = decode_vin(lookup, &record.vin).await?;
        log_info_indent(format!("[{}/{}] {}", i + 1, total, result.vin), 1);
        decoded.push((record, result));
    }

    log_success(format!("Decoded {} VINs", total));
    Ok(decoded)
}

/// Warn about VINs failing the sanity check; returns how many did.
fn report_suspect_vins(records: &[CanonicalRecord]) -> usize {
    let mut suspect = 0;
    for record in records {
        if let Err(errors) = validate_vin(&record.compact_vin()) {
            suspect += 1;
            log_warning_indent(
                format!("Suspect VIN '{}' ({}): {}", record.vin, record.vrn, errors.join(", ")),
                1,
            );
        }
    }
    if suspect > 0 {
        log_warning(format!("{} VINs look malformed, decoding them anyway", suspect));
    }
    suspect
}

fn report_classification(classification: &Classification, stats: &mut ProcessStats) {
    stats.eligible_rows = classification.valid.len();
    stats.manual_checks = classification.manual_check_count();
    stats.duplicate_vins = classification.duplicate_count();

    log_success(format!("{} vehicles eligible for the CAN check", stats.eligible_rows));
    if stats.manual_checks > 0 {
        log_warning(format!(
            "{} rows need a manual check ({} duplicate VINs)",
            stats.manual_checks, stats.duplicate_vins
        ));
    }

    let unresolved: Vec<_> = classification.unresolved().collect();
    stats.unresolved_vehicle_types = unresolved.len();
    if !unresolved.is_empty() {
        log_warning(format!("{} rows have no vehicle type:", unresolved.len()));
        for record in unresolved {
            log_warning_indent(
                format!("{} | {} | {}", record.source.vrn, record.source.vin, record.source.model),
                1,
            );
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
