//! Source rows to canonical records.
//!
//! Rows without a VIN are dropped; every other row becomes one
//! [`CanonicalRecord`] with nulls replaced by empty strings.

use crate::loader::{SourceTable, TargetField};
use crate::models::{CanonicalRecord, COUNTRY_US};

/// Build the canonical table, preserving source row order.
pub fn extract_canonical(table: &SourceTable) -> Vec<CanonicalRecord> {
    let text = |row: usize, field: TargetField| -> String {
        table.value(row, field).unwrap_or_default().to_string()
    };

    (0..table.rows.len())
        .filter(|&row| table.value(row, TargetField::Vin).is_some())
        .map(|row| CanonicalRecord {
            source_row: row,
            vrn: text(row, TargetField::VehicleAssetName),
            vin: text(row, TargetField::Vin),
            year: text(row, TargetField::ModelYear),
            make: text(row, TargetField::Make),
            model: text(row, TargetField::Model),
            fuel: text(row, TargetField::FuelType),
            country: COUNTRY_US.to_string(),
        })
        .collect()
}
