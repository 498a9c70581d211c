//! Autovin CLI - Decode fleet VINs and sort vehicles for the CAN check
//!
//! # Main Commands
//!
//! ```bash
//! autovin process fleet.xlsx         # Decode every VIN, write _CAN.csv and _processed.xlsx
//! autovin cache list                 # Manage memoized runs
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! autovin load fleet.xlsx            # Print canonical records as JSON
//! autovin decode 1HGCM82633A004352   # Decode a single VIN
//! autovin check-vin 1HGCM82633A004352
//! ```

use autovin::decoder::DecoderClient;
use autovin::logs::PROGRESS_LOG;
use autovin::{
    decode_vin, extract_canonical, load_table, process_file_with, validate_vin, PipelineError,
    ProcessOptions, ResultRegistry,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "autovin")]
#[command(about = "Decode fleet VINs and prepare the CAN-compatibility file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Decode service overrides shared by several commands
#[derive(clap::Args)]
struct DecoderArgs {
    /// Decode service base URL (default: AUTOVIN_DECODER_URL or NHTSA vPIC)
    #[arg(long)]
    decoder_url: Option<String>,

    /// Request timeout in seconds (default: AUTOVIN_TIMEOUT_SECS or 30)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: spreadsheet → decode → classify → CAN CSV + processed workbook
    Process {
        /// Input spreadsheet (xlsx, xls, ods or csv)
        input: PathBuf,

        #[command(flatten)]
        decoder: DecoderArgs,

        /// Year vehicle age is measured against (default: current year)
        #[arg(long)]
        reference_year: Option<i32>,

        /// Zero-based row holding the column headers
        #[arg(long, default_value = "3")]
        header_row: usize,

        /// Ignore and do not update the result cache
        #[arg(long)]
        no_cache: bool,

        /// Result cache directory
        #[arg(long, default_value = ".autovin/results")]
        cache_dir: PathBuf,

        /// Also append log entries to this file as JSON lines
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Load a spreadsheet and print the canonical records as JSON
    Load {
        /// Input spreadsheet
        input: PathBuf,

        /// Zero-based row holding the column headers
        #[arg(long, default_value = "3")]
        header_row: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a single VIN and print the result as JSON
    Decode {
        /// VIN, spaces allowed
        vin: String,

        #[command(flatten)]
        decoder: DecoderArgs,
    },

    /// Check VINs for length, characters and check digit
    CheckVin {
        /// VINs to check
        #[arg(required = true)]
        vins: Vec<String>,
    },

    /// Manage memoized runs
    Cache {
        /// Result cache directory
        #[arg(long, default_value = ".autovin/results")]
        cache_dir: PathBuf,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List all cached runs
    List,

    /// Delete a cached run
    Delete {
        /// Entry ID (fingerprint)
        id: String,
    },

    /// Delete every cached run
    Clear,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process {
            input,
            decoder,
            reference_year,
            header_row,
            no_cache,
            cache_dir,
            log_file,
        } => {
            let options = ProcessOptions {
                header_row,
                reference_year,
                no_cache,
                cache_dir,
            };
            cmd_process(&input, &decoder, options, log_file.as_deref()).await
        }

        Commands::Load {
            input,
            header_row,
            output,
        } => cmd_load(&input, header_row, output.as_deref()),

        Commands::Decode { vin, decoder } => cmd_decode(&vin, &decoder).await,

        Commands::CheckVin { vins } => cmd_check_vin(&vins),

        Commands::Cache { cache_dir, action } => cmd_cache(&cache_dir, action),
    };

    if let Err(e) = result {
        eprintln!("{}", error_message(e.as_ref()));
        std::process::exit(1);
    }
}

/// Text printed for a failed command. A timed-out run prints only `Timed out`.
fn error_message(err: &(dyn std::error::Error + 'static)) -> String {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::TimedOut) => PipelineError::TimedOut.to_string(),
        _ => format!("❌ Error: {}", err),
    }
}

/// Build the decode client from the environment, then apply flag overrides.
fn build_client(args: &DecoderArgs) -> Result<DecoderClient, Box<dyn std::error::Error>> {
    let mut client = DecoderClient::from_env()?;
    if let Some(ref url) = args.decoder_url {
        client = client.with_base_url(url)?;
    }
    if let Some(secs) = args.timeout {
        client = client.with_timeout(Duration::from_secs(secs))?;
    }
    Ok(client)
}

async fn cmd_process(
    input: &Path,
    decoder: &DecoderArgs,
    options: ProcessOptions,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = log_file {
        PROGRESS_LOG.attach_file(path)?;
    }

    eprintln!("📄 Processing: {}", input.display());
    let client = build_client(decoder)?;

    let result = process_file_with(input, options, &client).await?;

    let stats = &result.stats;
    eprintln!("\n📊 Results{}:", if result.cached { " (cached)" } else { "" });
    eprintln!("   Source rows: {}", stats.source_rows);
    eprintln!("   Rows with a VIN: {}", stats.canonical_rows);
    eprintln!("   Decoded: {}", stats.decoded_rows);
    eprintln!("   Decode errors: {}", stats.decode_errors);
    eprintln!("   Suspect VINs: {}", stats.suspect_vins);
    eprintln!("   ✅ Eligible for CAN check: {}", stats.eligible_rows);
    eprintln!(
        "   ⚠️  Manual check needed: {} ({} duplicate VINs)",
        stats.manual_checks, stats.duplicate_vins
    );
    eprintln!("   Unresolved vehicle types: {}", stats.unresolved_vehicle_types);

    println!("{}", result.outputs.can.display());
    println!("{}", result.outputs.processed.display());

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_load(
    input: &Path,
    header_row: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = load_table(input, header_row)?;
    let records = extract_canonical(&table);
    eprintln!("✅ {} records with a VIN", records.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;
    Ok(())
}

async fn cmd_decode(vin: &str, decoder: &DecoderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(decoder)?;
    eprintln!("🔎 Decoding {} via {}", vin, client.base_url());

    let decoded = decode_vin(&client, vin).await?;
    if decoded.is_error() {
        eprintln!("⚠️  No information found for input VIN");
    }
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

fn cmd_check_vin(vins: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut invalid = 0;
    for vin in vins {
        let compact = vin.replace(' ', "");
        match validate_vin(&compact) {
            Ok(()) => println!("✅ {}", compact),
            Err(errors) => {
                invalid += 1;
                println!("❌ {}", compact);
                for err in errors {
                    println!("   - {}", err);
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", vins.len() - invalid, invalid);
    if invalid > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_cache(cache_dir: &Path, action: CacheAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = ResultRegistry::with_dir(cache_dir);

    match action {
        CacheAction::List => {
            let entries = registry.list();
            if entries.is_empty() {
                eprintln!("📋 No cached runs.");
                return Ok(());
            }

            eprintln!("📋 Cached runs ({}):\n", entries.len());
            for entry in entries {
                println!("  📄 {} ({})", entry.input_path, entry.id);
                println!("     Created: {}", entry.created_at);
                println!("     Decoder: {}", entry.decoder);
                println!("     Reference year: {}", entry.reference_year);
                println!("     CAN file: {}", entry.outputs.can.display());
                println!("     Processed: {}", entry.outputs.processed.display());
                println!(
                    "     Eligible: {} / {} rows",
                    entry.stats.eligible_rows, entry.stats.canonical_rows
                );
                if !entry.outputs.exist() {
                    println!("     ⚠️  Outputs missing, entry is stale");
                }
                println!();
            }
        }

        CacheAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Cached run deleted: {}", id);
        }

        CacheAction::Clear => {
            let removed = registry.clear()?;
            eprintln!("🗑️  Removed {} cached run(s)", removed);
        }
    }

    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autovin::{DecodeError, LoadError};

    #[test]
    fn test_timed_out_message_is_bare() {
        let err: Box<dyn std::error::Error> = Box::new(PipelineError::from(DecodeError::Timeout));
        assert_eq!(error_message(err.as_ref()), "Timed out");
    }

    #[test]
    fn test_other_errors_are_prefixed() {
        let err: Box<dyn std::error::Error> =
            Box::new(PipelineError::from(LoadError::NoSheets));
        assert_eq!(
            error_message(err.as_ref()),
            "❌ Error: Load error: Workbook contains no sheets"
        );

        let err: Box<dyn std::error::Error> = "no cached run with that id".into();
        assert_eq!(error_message(err.as_ref()), "❌ Error: no cached run with that id");
    }

    #[test]
    fn test_cli_parses_process_flags() {
        let cli = Cli::try_parse_from([
            "autovin",
            "process",
            "fleet.xlsx",
            "--reference-year",
            "2026",
            "--timeout",
            "5",
            "--no-cache",
        ])
        .unwrap();

        match cli.command {
            Commands::Process {
                input,
                decoder,
                reference_year,
                header_row,
                no_cache,
                ..
            } => {
                assert_eq!(input, PathBuf::from("fleet.xlsx"));
                assert_eq!(decoder.timeout, Some(5));
                assert_eq!(reference_year, Some(2026));
                assert_eq!(header_row, 3);
                assert!(no_cache);
            }
            _ => panic!("expected process command"),
        }
    }
}
