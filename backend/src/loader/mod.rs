//! Asset spreadsheet loading and column normalization.
//!
//! Fleet asset lists come in slightly different shapes: several title rows
//! above the header, one or many sheets, headers like "VIN #" or
//! "Vehicle Asset Name (VRN)". The loader reads the raw cell grid, takes the
//! header at a fixed offset and maps headers onto [`TargetField`]s by
//! case-insensitive substring match.
//!
//! ```text
//! row 0  │ Fleet Vehicle List            │
//! row 1  │                               │
//! row 2  │ Customer: ...                 │
//! row 3  │ Vehicle Asset Name │ VIN │ ... │  <- header (offset 3)
//! row 4+ │ data rows                     │
//! ```

use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::parser::parse_csv_file_auto;

/// Sheet read from multi-sheet workbooks.
pub const ASSET_SHEET: &str = "Vehicle & Asset List";

/// Zero-based row index of the header.
pub const DEFAULT_HEADER_ROW: usize = 3;

// =============================================================================
// Target fields
// =============================================================================

/// Canonical columns recognised in the source header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetField {
    VehicleAssetName,
    ModelYear,
    Make,
    Model,
    Vin,
    FuelType,
}

impl TargetField {
    /// Match order. "model year" must be tried before "model".
    pub const ALL: [TargetField; 6] = [
        TargetField::VehicleAssetName,
        TargetField::ModelYear,
        TargetField::Make,
        TargetField::Model,
        TargetField::Vin,
        TargetField::FuelType,
    ];

    /// Lowercase substring that identifies the column.
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::VehicleAssetName => "vehicle asset name",
            Self::ModelYear => "model year",
            Self::Make => "make",
            Self::Model => "model",
            Self::Vin => "vin",
            Self::FuelType => "fuel type",
        }
    }

    /// Normalized column name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::VehicleAssetName => "Vehicle Asset Name",
            Self::ModelYear => "Model Year",
            Self::Make => "Make",
            Self::Model => "Model",
            Self::Vin => "VIN",
            Self::FuelType => "Fuel Type",
        }
    }
}

/// First target whose pattern occurs in `header`, ignoring case.
pub fn match_column(header: &str) -> Option<TargetField> {
    let lower = header.to_lowercase();
    TargetField::ALL
        .into_iter()
        .find(|field| lower.contains(field.pattern()))
}

// =============================================================================
// Source table
// =============================================================================

/// Where the rows came from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Workbook { sheet: String },
    Csv { encoding: String, delimiter: char },
}

/// Data rows below the header with the column mapping.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Header cells as written in the file.
    pub headers: Vec<String>,
    /// Target field -> column index.
    pub columns: HashMap<TargetField, usize>,
    /// Data rows, `None` for null cells.
    pub rows: Vec<Vec<Option<String>>>,
    pub source: InputSource,
}

impl SourceTable {
    /// Cell of `field` in data row `row`, `None` when null or unmapped.
    pub fn value(&self, row: usize, field: TargetField) -> Option<&str> {
        let col = *self.columns.get(&field)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    pub fn has_column(&self, field: TargetField) -> bool {
        self.columns.contains_key(&field)
    }
}

/// Build a table from a raw grid whose header sits at `header_row`.
pub fn build_table(
    grid: Vec<Vec<Option<String>>>,
    header_row: usize,
    source: InputSource,
) -> LoadResult<SourceTable> {
    if grid.len() <= header_row {
        return Err(LoadError::MissingHeader {
            row: header_row,
            rows: grid.len(),
        });
    }

    let mut grid = grid;
    let rows = grid.split_off(header_row + 1);
    let header_cells = grid.pop().unwrap_or_default();

    let headers: Vec<String> = header_cells
        .into_iter()
        .enumerate()
        .map(|(i, cell)| cell.unwrap_or_else(|| format!("Unnamed: {}", i)))
        .collect();

    let mut columns = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        let Some(field) = match_column(header) else {
            continue;
        };
        if let Some(&kept) = columns.get(&field) {
            log_warning(format!(
                "Column '{}' also matches {}, keeping '{}'",
                header,
                field.label(),
                headers[kept]
            ));
            continue;
        }
        columns.insert(field, idx);
    }

    if !columns.contains_key(&TargetField::Vin) {
        return Err(LoadError::MissingVinColumn(headers));
    }

    for field in TargetField::ALL {
        if !columns.contains_key(&field) {
            log_warning(format!("No '{}' column, values left empty", field.label()));
        }
    }

    Ok(SourceTable {
        headers,
        columns,
        rows,
        source,
    })
}

// =============================================================================
// Reading
// =============================================================================

/// Load the asset table from a workbook or CSV file.
pub fn load_table(path: &Path, header_row: usize) -> LoadResult<SourceTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let (grid, source) = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => {
            log_info(format!("📖 Reading workbook: {}", path.display()));
            let (sheet, grid) = read_workbook_grid(path)?;
            log_success(format!("Sheet: {}", sheet));
            (grid, InputSource::Workbook { sheet })
        }
        "csv" | "txt" => {
            log_info(format!("📖 Reading CSV: {}", path.display()));
            let parsed = parse_csv_file_auto(path)?;
            log_success(format!("Detected encoding: {}", parsed.encoding));
            log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
            (
                parsed.rows,
                InputSource::Csv {
                    encoding: parsed.encoding,
                    delimiter: parsed.delimiter,
                },
            )
        }
        _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    };

    let table = build_table(grid, header_row, source)?;
    log_success(format!(
        "Read {} rows, {} columns",
        table.rows.len(),
        table.headers.len()
    ));
    Ok(table)
}

/// Pick the sheet to read: the asset sheet when there are several.
pub fn select_sheet(names: &[String]) -> LoadResult<String> {
    match names {
        [] => Err(LoadError::NoSheets),
        [only] => Ok(only.clone()),
        _ => names
            .iter()
            .find(|n| n.as_str() == ASSET_SHEET)
            .cloned()
            .ok_or_else(|| LoadError::MissingSheet(ASSET_SHEET.to_string())),
    }
}

/// Read the selected sheet as a grid addressed by absolute sheet row.
fn read_workbook_grid(path: &Path) -> LoadResult<(String, Vec<Vec<Option<String>>>)> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| LoadError::Workbook(e.to_string()))?;

    let names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet = select_sheet(&names)?;

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| LoadError::Workbook(format!("{}: {}", sheet, e)))?;

    // calamine ranges start at the first used cell
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); start_row as usize];

    for row in range.rows() {
        let mut cells: Vec<Option<String>> = vec![None; start_col as usize];
        cells.extend(row.iter().map(cell_to_string));
        grid.push(cells);
    }

    Ok((sheet, grid))
}

/// Render a cell as text; empty and error cells are null.
pub fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            Some(format!("{}", *f as i64))
        }
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    fn cells(values: &[&str]) -> Vec<Option<String>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    fn sample_grid() -> Vec<Vec<Option<String>>> {
        vec![
            cells(&["Fleet list"]),
            vec![],
            cells(&["Customer: ACME"]),
            cells(&["Vehicle Asset Name", "MODEL YEAR", "Make", "Model", "VIN #", "Fuel Type"]),
            cells(&["Truck 1", "2015", "Honda", "Accord", "1HGCM82633A004352", "Gasoline"]),
        ]
    }

    #[test]
    fn test_match_column_order() {
        assert_eq!(match_column("Model Year"), Some(TargetField::ModelYear));
        assert_eq!(match_column("MODEL"), Some(TargetField::Model));
        assert_eq!(match_column("Vehicle VIN"), Some(TargetField::Vin));
        assert_eq!(match_column("Primary Fuel Type"), Some(TargetField::FuelType));
        assert_eq!(match_column("Odometer"), None);
    }

    #[test]
    fn test_build_table_maps_columns() {
        let table = build_table(
            sample_grid(),
            DEFAULT_HEADER_ROW,
            InputSource::Workbook { sheet: "Sheet1".into() },
        )
        .unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.value(0, TargetField::Vin), Some("1HGCM82633A004352"));
        assert_eq!(table.value(0, TargetField::ModelYear), Some("2015"));
        assert_eq!(table.value(0, TargetField::VehicleAssetName), Some("Truck 1"));
    }

    #[test]
    fn test_first_column_wins_for_duplicate_target() {
        let grid = vec![
            cells(&["VIN", "Make", "VIN (old)"]),
            cells(&["AAA", "Ford", "BBB"]),
        ];
        let table = build_table(grid, 0, InputSource::Workbook { sheet: "S".into() }).unwrap();
        assert_eq!(table.value(0, TargetField::Vin), Some("AAA"));
    }

    #[test]
    fn test_missing_vin_column() {
        let grid = vec![cells(&["Asset", "Make"]), cells(&["Truck", "Ford"])];
        let err = build_table(grid, 0, InputSource::Workbook { sheet: "S".into() }).unwrap_err();
        assert!(matches!(err, LoadError::MissingVinColumn(_)));
    }

    #[test]
    fn test_header_beyond_sheet() {
        let grid = vec![cells(&["only a title"])];
        let err = build_table(grid, 3, InputSource::Workbook { sheet: "S".into() }).unwrap_err();
        assert!(matches!(err, LoadError::MissingHeader { row: 3, rows: 1 }));
    }

    #[test]
    fn test_select_sheet() {
        let single = vec!["Anything".to_string()];
        assert_eq!(select_sheet(&single).unwrap(), "Anything");

        let multi = vec!["Summary".to_string(), ASSET_SHEET.to_string()];
        assert_eq!(select_sheet(&multi).unwrap(), ASSET_SHEET);

        let wrong = vec!["Summary".to_string(), "Other".to_string()];
        assert!(matches!(select_sheet(&wrong), Err(LoadError::MissingSheet(_))));
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell_to_string(&Data::Float(2015.0)).as_deref(), Some("2015"));
        assert_eq!(cell_to_string(&Data::Float(1.5)).as_deref(), Some("1.5"));
        assert_eq!(cell_to_string(&Data::Int(7)).as_deref(), Some("7"));
        assert_eq!(cell_to_string(&Data::String("  ".into())), None);
        assert_eq!(cell_to_string(&Data::Empty), None);
    }

    #[test]
    fn test_load_workbook_with_offset_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fleet.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Fleet list").unwrap();
        let headers = ["Vehicle Asset Name", "Model Year", "Make", "Model", "VIN", "Fuel Type"];
        for (col, h) in headers.iter().enumerate() {
            sheet.write_string(3, col as u16, *h).unwrap();
        }
        sheet.write_string(4, 0, "Truck 1").unwrap();
        sheet.write_number(4, 1, 2015).unwrap();
        sheet.write_string(4, 4, "1HGCM82633A004352").unwrap();
        workbook.save(&path).unwrap();

        let table = load_table(&path, DEFAULT_HEADER_ROW).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.value(0, TargetField::ModelYear), Some("2015"));
        assert_eq!(table.value(0, TargetField::Make), None);
    }

    #[test]
    fn test_leading_blank_rows_and_columns_keep_sheet_positions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fleet.xlsx");

        // Rows 0-2 and column A left empty: the used range starts at B4
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let headers = ["Vehicle Asset Name", "Model Year", "Make", "Model", "VIN", "Fuel Type"];
        for (col, h) in headers.iter().enumerate() {
            sheet.write_string(3, col as u16 + 1, *h).unwrap();
        }
        sheet.write_string(4, 1, "Truck 1").unwrap();
        sheet.write_string(4, 5, "1HGCM82633A004352").unwrap();
        workbook.save(&path).unwrap();

        let table = load_table(&path, DEFAULT_HEADER_ROW).unwrap();
        assert_eq!(table.headers[0], "Unnamed: 0");
        assert_eq!(table.headers[5], "VIN");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.value(0, TargetField::VehicleAssetName), Some("Truck 1"));
        assert_eq!(table.value(0, TargetField::Vin), Some("1HGCM82633A004352"));
    }

    #[test]
    fn test_multi_sheet_requires_asset_sheet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fleet.xlsx");

        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Summary").unwrap();
        workbook.add_worksheet().set_name("Notes").unwrap();
        workbook.save(&path).unwrap();

        let err = load_table(&path, DEFAULT_HEADER_ROW).unwrap_err();
        assert!(matches!(err, LoadError::MissingSheet(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_table(Path::new("fleet.pdf"), DEFAULT_HEADER_ROW).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }
}
