//! CSV input with encoding and delimiter auto-detection.
//!
//! Fleet exports sometimes arrive as CSV instead of a workbook. This module
//! turns such a file into the same raw cell grid the workbook loader
//! produces, so header detection and column mapping work unchanged.

use std::path::Path;

use crate::error::{LoadError, LoadResult};

/// Number of leading lines inspected when guessing the delimiter.
const DELIMITER_SAMPLE_LINES: usize = 10;

/// Raw CSV grid with detection metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Every line of the file, cells as read (`None` for blank cells)
    pub rows: Vec<Vec<Option<String>>>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8, ASCII and anything unknown
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first lines.
///
/// Title rows above the header often carry no delimiter at all, so the
/// busiest of the sampled lines decides.
pub fn detect_delimiter(content: &str) -> char {
    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = content
            .lines()
            .take(DELIMITER_SAMPLE_LINES)
            .map(|line| line.matches(sep).count())
            .max()
            .unwrap_or(0);
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text into a grid of cells.
///
/// Completely empty lines are skipped, so a header offset counts
/// non-blank lines only.
pub fn parse_grid(content: &str, delimiter: char) -> LoadResult<Vec<Vec<Option<String>>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
            LoadError::Csv(format!("line {}: {}", line, e))
        })?;

        let cells = record
            .iter()
            .map(|value| {
                let value = value.trim();
                if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            })
            .collect();
        rows.push(cells);
    }

    Ok(rows)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> LoadResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let rows = parse_grid(&content, delimiter)?;

    Ok(ParseResult {
        rows,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> LoadResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}
