//! Output files.
//!
//! - `<input>_CAN.csv`: eligible vehicles for the CAN-compatibility check
//! - `<input>_processed.xlsx`: every row with its review flag, sheet
//!   "Processed VINs"

use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::WriteResult;
use crate::models::{ClassifiedRecord, ValidVinRecord};

/// Sheet name of the processed workbook.
pub const PROCESSED_SHEET: &str = "Processed VINs";

/// Columns of the CAN file.
pub const CAN_COLUMNS: [&str; 7] = ["VRN", "VIN", "YEAR", "MAKE", "MODEL", "FUEL", "COUNTRY"];

/// Columns of the processed workbook.
pub const PROCESSED_COLUMNS: [&str; 10] = [
    "VRN",
    "VIN",
    "YEAR",
    "MAKE",
    "MODEL",
    "FUEL",
    "COUNTRY",
    "VEHICLE TYPE",
    "MANUAL CHECK NEEDED",
    "ERROR CODE",
];

/// Fixed width of the ERROR CODE column.
pub const ERROR_CODE_WIDTH: f64 = 12.0;

/// Padding added to the longest value of auto-sized columns.
const WIDTH_PADDING: usize = 2;

/// Paths of the two generated files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    pub processed: PathBuf,
    pub can: PathBuf,
}

impl OutputPaths {
    /// Derive both paths from the input path.
    pub fn for_input(input: &Path) -> Self {
        Self {
            processed: with_suffix(input, "_processed.xlsx"),
            can: with_suffix(input, "_CAN.csv"),
        }
    }

    pub fn exist(&self) -> bool {
        self.processed.is_file() && self.can.is_file()
    }
}

/// `dir/fleet.xlsx` + `_CAN.csv` -> `dir/fleet_CAN.csv`
fn with_suffix(input: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = input.with_extension("").into_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

// =============================================================================
// CAN CSV
// =============================================================================

/// Render the CAN file. The header is written even with no rows.
pub fn can_csv_bytes(records: &[ValidVinRecord]) -> WriteResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CAN_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}

/// Write the CAN file to `path`.
pub fn write_can_csv(records: &[ValidVinRecord], path: &Path) -> WriteResult<()> {
    let bytes = can_csv_bytes(records)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

// =============================================================================
// Processed workbook
// =============================================================================

/// Cells of one processed row, `None` for empty cells.
pub fn processed_row(record: &ClassifiedRecord) -> [Option<String>; 10] {
    let source = &record.source;
    [
        Some(source.vrn.clone()),
        Some(source.vin.clone()),
        Some(source.year.clone()),
        Some(source.make.clone()),
        Some(source.model.clone()),
        Some(source.fuel.clone()),
        Some(source.country.clone()),
        record.vehicle_type.value().map(String::from),
        Some(record.manual_check.label().to_string()),
        record.decoded.error_code.clone(),
    ]
}

/// Column widths: longest value + 2, ERROR CODE fixed.
pub fn column_widths(rows: &[[Option<String>; 10]]) -> [f64; 10] {
    let mut widths = [0.0; 10];
    for (col, header) in PROCESSED_COLUMNS.iter().enumerate() {
        if *header == "ERROR CODE" {
            widths[col] = ERROR_CODE_WIDTH;
            continue;
        }
        let longest = rows
            .iter()
            .filter_map(|row| row[col].as_deref())
            .map(|v| v.chars().count())
            .chain(std::iter::once(header.chars().count()))
            .max()
            .unwrap_or(0);
        widths[col] = (longest + WIDTH_PADDING) as f64;
    }
    widths
}

/// Write the processed workbook to `path`.
pub fn write_processed_workbook(records: &[ClassifiedRecord], path: &Path) -> WriteResult<()> {
    let rows: Vec<[Option<String>; 10]> = records.iter().map(processed_row).collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(PROCESSED_SHEET)?;

    let header_format = Format::new().set_bold();
    for (col, header) in PROCESSED_COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (row_idx, row) in rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            if let Some(value) = cell {
                sheet.write_string(excel_row, col as u16, value)?;
            }
        }
    }

    for (col, width) in column_widths(&rows).into_iter().enumerate() {
        sheet.set_column_width(col as u16, width)?;
    }

    workbook.save(path)?;
    Ok(())
}

/// Write both files next to the input.
pub fn write_outputs(
    classified: &[ClassifiedRecord],
    valid: &[ValidVinRecord],
    input: &Path,
) -> WriteResult<OutputPaths> {
    let paths = OutputPaths::for_input(input);
    write_can_csv(valid, &paths.can)?;
    write_processed_workbook(classified, &paths.processed)?;
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalRecord, DecodedResult, ManualCheck, VehicleTypeResolution};
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::tempdir;

    fn classified(vrn: &str, vin: &str, manual_check: ManualCheck) -> ClassifiedRecord {
        ClassifiedRecord {
            source: CanonicalRecord {
                source_row: 0,
                vrn: vrn.into(),
                vin: vin.into(),
                year: "2015".into(),
                make: "Honda".into(),
                model: "Accord".into(),
                fuel: "Gasoline".into(),
                country: "US".into(),
            },
            decoded: DecodedResult::unparsable(vin),
            manual_check,
            vehicle_type: VehicleTypeResolution::Unresolved,
        }
    }

    #[test]
    fn test_output_paths() {
        let paths = OutputPaths::for_input(Path::new("/data/fleet.xlsx"));
        assert_eq!(paths.can, PathBuf::from("/data/fleet_CAN.csv"));
        assert_eq!(paths.processed, PathBuf::from("/data/fleet_processed.xlsx"));

        let paths = OutputPaths::for_input(Path::new("fleet.v2.xls"));
        assert_eq!(paths.can, PathBuf::from("fleet.v2_CAN.csv"));
    }

    #[test]
    fn test_can_csv_layout() {
        let records = vec![ValidVinRecord {
            vrn: "Truck 1".into(),
            vin: "1HGCM82633A004352".into(),
            year: Some("2015".into()),
            make: Some("HONDA".into()),
            model: Some("Accord".into()),
            fuel: None,
            country: "US".into(),
        }];

        let text = String::from_utf8(can_csv_bytes(&records).unwrap()).unwrap();
        assert_eq!(
            text,
            "VRN,VIN,YEAR,MAKE,MODEL,FUEL,COUNTRY\nTruck 1,1HGCM82633A004352,2015,HONDA,Accord,,US\n"
        );
    }

    #[test]
    fn test_can_csv_header_without_rows() {
        let text = String::from_utf8(can_csv_bytes(&[]).unwrap()).unwrap();
        assert_eq!(text, "VRN,VIN,YEAR,MAKE,MODEL,FUEL,COUNTRY\n");
    }

    #[test]
    fn test_column_widths() {
        let rows = vec![processed_row(&classified(
            "Very Long Asset Name 12",
            "1HGCM82633A004352",
            ManualCheck::DuplicateVin,
        ))];
        let widths = column_widths(&rows);

        assert_eq!(widths[0], 25.0); // 23 chars + 2
        assert_eq!(widths[2], 6.0); // "YEAR" header beats "2015"
        assert_eq!(widths[8], 21.0); // "MANUAL CHECK NEEDED" (19) beats "YES: Duplicate Vin" (18)
        assert_eq!(widths[9], ERROR_CODE_WIDTH);
    }

    #[test]
    fn test_processed_workbook_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out_processed.xlsx");
        let records = vec![classified("Truck 1", "1HGCM82633A004352", ManualCheck::Yes)];

        write_processed_workbook(&records, &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec![PROCESSED_SHEET.to_string()]);
        let range = workbook.worksheet_range(PROCESSED_SHEET).unwrap();
        let rows: Vec<&[Data]> = range.rows().collect();

        assert_eq!(rows[0][8], Data::String("MANUAL CHECK NEEDED".into()));
        assert_eq!(rows[1][0], Data::String("Truck 1".into()));
        assert_eq!(rows[1][7], Data::Empty); // unresolved vehicle type
        assert_eq!(rows[1][8], Data::String("YES".into()));
        assert_eq!(
            rows[1][9],
            Data::String("Error: No information found for input VIN".into())
        );
    }
}
