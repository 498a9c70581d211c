//! Domain models for the autovin pipeline.
//!
//! Records flow through the pipeline in this order:
//!
//! - [`CanonicalRecord`] - one source row with a VIN, all values as strings
//! - [`DecodedResult`] - what the decode service reported for that VIN
//! - [`ClassifiedRecord`] - both of the above plus the review flag and
//!   the resolved vehicle type
//! - [`ValidVinRecord`] - a row of the CAN-compatibility file

use serde::{Deserialize, Serialize};

/// Country written for every canonical record.
pub const COUNTRY_US: &str = "US";

/// Marker used for every decoded field when the service response is unusable.
pub const ERROR_MARKER: &str = "Error";

/// Default for a variable absent from the service response.
pub const NOT_AVAILABLE: &str = "N/A";

/// Error code recorded for unparsable responses.
pub const NO_INFORMATION_ERROR: &str = "Error: No information found for input VIN";

// =============================================================================
// Canonical Record
// =============================================================================

/// A source row normalized to the fixed schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Index of the data row (below the header) this record came from.
    pub source_row: usize,
    /// Vehicle asset name.
    pub vrn: String,
    /// VIN as authored, spaces included.
    pub vin: String,
    pub year: String,
    pub make: String,
    pub model: String,
    pub fuel: String,
    /// Always [`COUNTRY_US`].
    pub country: String,
}

impl CanonicalRecord {
    /// VIN with spaces removed, as sent to the decode service.
    pub fn compact_vin(&self) -> String {
        compact_vin(&self.vin)
    }
}

/// Strip every space from a VIN.
pub fn compact_vin(vin: &str) -> String {
    vin.replace(' ', "")
}

// =============================================================================
// Decoded Result
// =============================================================================

/// Attributes reported by the decode service for one VIN.
///
/// `None` means the service returned the variable with a null value;
/// a variable missing from the response is [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedResult {
    /// Space-stripped VIN.
    pub vin: String,
    pub year: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub fuel: Option<String>,
    pub country: String,
    pub vehicle_type: Option<String>,
    pub error_code: Option<String>,
}

impl DecodedResult {
    /// Result recorded when the service body could not be parsed.
    pub fn unparsable(vin: impl Into<String>) -> Self {
        let marker = || Some(ERROR_MARKER.to_string());
        Self {
            vin: vin.into(),
            year: marker(),
            make: marker(),
            model: marker(),
            fuel: marker(),
            country: ERROR_MARKER.to_string(),
            vehicle_type: marker(),
            error_code: Some(NO_INFORMATION_ERROR.to_string()),
        }
    }

    /// Whether this is the [`DecodedResult::unparsable`] marker row.
    pub fn is_error(&self) -> bool {
        self.error_code.as_deref() == Some(NO_INFORMATION_ERROR)
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Value of the MANUAL CHECK NEEDED column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManualCheck {
    No,
    Yes,
    DuplicateVin,
}

impl ManualCheck {
    pub fn label(&self) -> &'static str {
        match self {
            Self::No => "NO",
            Self::Yes => "YES",
            Self::DuplicateVin => "YES: Duplicate Vin",
        }
    }

    /// Whether a person has to look at the row.
    pub fn needs_review(&self) -> bool {
        !matches!(self, Self::No)
    }
}

/// Outcome of the vehicle-type backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleTypeResolution {
    /// Remote type kept as reported.
    Reported(String),
    /// Model name mentions "trailer".
    InferredTrailer,
    /// Model name mentions "lift".
    InferredLift,
    /// Remote lookup errored and nothing could be inferred.
    Unknown,
    /// Remote type was null and nothing could be inferred.
    Unresolved,
}

impl VehicleTypeResolution {
    /// Cell value for the VEHICLE TYPE column; `None` leaves it empty.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Reported(t) => Some(t.as_str()),
            Self::InferredTrailer => Some("TRAILER"),
            Self::InferredLift => Some("LIFT"),
            Self::Unknown => Some("UNKNOWN"),
            Self::Unresolved => None,
        }
    }
}

/// A source row with its decode result and derived flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub source: CanonicalRecord,
    pub decoded: DecodedResult,
    pub manual_check: ManualCheck,
    pub vehicle_type: VehicleTypeResolution,
}

/// A row of the CAN-compatibility CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidVinRecord {
    #[serde(rename = "VRN")]
    pub vrn: String,
    #[serde(rename = "VIN")]
    pub vin: String,
    #[serde(rename = "YEAR")]
    pub year: Option<String>,
    #[serde(rename = "MAKE")]
    pub make: Option<String>,
    #[serde(rename = "MODEL")]
    pub model: Option<String>,
    #[serde(rename = "FUEL")]
    pub fuel: Option<String>,
    #[serde(rename = "COUNTRY")]
    pub country: String,
}

impl ValidVinRecord {
    pub fn from_decoded(vrn: &str, decoded: &DecodedResult) -> Self {
        Self {
            vrn: vrn.to_string(),
            vin: decoded.vin.clone(),
            year: decoded.year.clone(),
            make: decoded.make.clone(),
            model: decoded.model.clone(),
            fuel: decoded.fuel.clone(),
            country: decoded.country.clone(),
        }
    }
}

// =============================================================================
// Run statistics
// =============================================================================

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    /// Data rows below the header.
    pub source_rows: usize,
    /// Rows with a VIN.
    pub canonical_rows: usize,
    /// Rows the service answered with a usable body.
    pub decoded_rows: usize,
    /// Rows recorded as "Error".
    pub decode_errors: usize,
    /// Rows in the CAN file.
    pub eligible_rows: usize,
    /// Rows flagged YES or "YES: Duplicate Vin".
    pub manual_checks: usize,
    pub duplicate_vins: usize,
    /// Rows whose vehicle type stayed empty.
    pub unresolved_vehicle_types: usize,
    /// VINs failing the sanity check.
    pub suspect_vins: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_vin_strips_spaces() {
        assert_eq!(compact_vin(" 1HGCM 82633A 004352 "), "1HGCM82633A004352");
    }

    #[test]
    fn test_unparsable_marks_every_field() {
        let result = DecodedResult::unparsable("1HGCM82633A004352");
        assert_eq!(result.year.as_deref(), Some("Error"));
        assert_eq!(result.make.as_deref(), Some("Error"));
        assert_eq!(result.model.as_deref(), Some("Error"));
        assert_eq!(result.fuel.as_deref(), Some("Error"));
        assert_eq!(result.country, "Error");
        assert_eq!(result.vehicle_type.as_deref(), Some("Error"));
        assert_eq!(
            result.error_code.as_deref(),
            Some("Error: No information found for input VIN")
        );
        assert!(result.is_error());
    }

    #[test]
    fn test_manual_check_labels() {
        assert_eq!(ManualCheck::No.label(), "NO");
        assert_eq!(ManualCheck::Yes.label(), "YES");
        assert_eq!(ManualCheck::DuplicateVin.label(), "YES: Duplicate Vin");
        assert!(ManualCheck::DuplicateVin.needs_review());
        assert!(!ManualCheck::No.needs_review());
    }

    #[test]
    fn test_unresolved_vehicle_type_is_empty() {
        assert_eq!(VehicleTypeResolution::Unresolved.value(), None);
        assert_eq!(VehicleTypeResolution::InferredLift.value(), Some("LIFT"));
        assert_eq!(
            VehicleTypeResolution::Reported("TRUCK".into()).value(),
            Some("TRUCK")
        );
    }
}
