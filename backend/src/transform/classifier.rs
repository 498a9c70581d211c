//! CAN-compatibility classification.
//!
//! Three independent decisions per decoded row:
//!
//! - **Eligibility**: does the vehicle go into the CAN file?
//! - **Manual check**: does a person need to review the row? Depends on
//!   the VINs seen in earlier rows, so it is computed as a fold over the
//!   rows in source order.
//! - **Vehicle type**: keep the reported type or infer one from the model.

use chrono::Datelike;
use std::collections::HashSet;

use crate::models::{
    CanonicalRecord, ClassifiedRecord, DecodedResult, ManualCheck, ValidVinRecord,
    VehicleTypeResolution, ERROR_MARKER,
};

/// Vehicles this old or older are left out of the CAN file.
pub const MAX_VEHICLE_AGE_YEARS: i32 = 30;

/// Fuel values that disqualify a vehicle (null does too).
pub const EXCLUDED_FUELS: [&str; 2] = ["Not Applicable", ERROR_MARKER];

/// Current calendar year, the default reference for vehicle age.
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// Output of [`classify`].
#[derive(Debug, Clone)]
pub struct Classification {
    /// Every decoded row, in source order.
    pub records: Vec<ClassifiedRecord>,
    /// Rows of the CAN file, deduplicated by VIN.
    pub valid: Vec<ValidVinRecord>,
}

impl Classification {
    pub fn manual_check_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.manual_check.needs_review())
            .count()
    }

    pub fn duplicate_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.manual_check == ManualCheck::DuplicateVin)
            .count()
    }

    /// Rows whose vehicle type stayed empty.
    pub fn unresolved(&self) -> impl Iterator<Item = &ClassifiedRecord> {
        self.records
            .iter()
            .filter(|r| r.vehicle_type == VehicleTypeResolution::Unresolved)
    }
}

/// Classify decoded rows against `reference_year`.
pub fn classify(rows: Vec<(CanonicalRecord, DecodedResult)>, reference_year: i32) -> Classification {
    let valid = select_valid_vins(&rows, reference_year);
    let eligible: HashSet<String> = valid.iter().map(|v| v.vin.clone()).collect();
    let checks = assess_manual_checks(&rows, &eligible);

    let records = rows
        .into_iter()
        .zip(checks)
        .map(|((source, decoded), manual_check)| {
            let vehicle_type = resolve_vehicle_type(decoded.vehicle_type.as_deref(), &source.model);
            ClassifiedRecord {
                source,
                decoded,
                manual_check,
                vehicle_type,
            }
        })
        .collect();

    Classification { records, valid }
}

// =============================================================================
// Eligibility
// =============================================================================

/// Fuel is known and usable, and the vehicle is under the age limit.
///
/// A model year that is not an integer is never eligible.
pub fn is_eligible(decoded: &DecodedResult, reference_year: i32) -> bool {
    let fuel_ok = match decoded.fuel.as_deref() {
        Some(fuel) => !EXCLUDED_FUELS.contains(&fuel),
        None => false,
    };
    if !fuel_ok {
        return false;
    }

    decoded
        .year
        .as_deref()
        .and_then(|y| y.trim().parse::<i32>().ok())
        .and_then(|year| reference_year.checked_sub(year))
        .is_some_and(|age| age < MAX_VEHICLE_AGE_YEARS)
}

/// CAN rows: eligible rows, first occurrence of each VIN.
pub fn select_valid_vins(
    rows: &[(CanonicalRecord, DecodedResult)],
    reference_year: i32,
) -> Vec<ValidVinRecord> {
    let mut kept = HashSet::new();
    rows.iter()
        .filter(|(_, decoded)| is_eligible(decoded, reference_year))
        .filter(|(_, decoded)| kept.insert(decoded.vin.clone()))
        .map(|(source, decoded)| ValidVinRecord::from_decoded(&source.vrn, decoded))
        .collect()
}

// =============================================================================
// Manual check
// =============================================================================

/// Manual-check flag for every row, folding the seen-VIN set in order.
pub fn assess_manual_checks(
    rows: &[(CanonicalRecord, DecodedResult)],
    eligible: &HashSet<String>,
) -> Vec<ManualCheck> {
    let (_, checks) = rows.iter().fold(
        (HashSet::new(), Vec::with_capacity(rows.len())),
        |(mut seen, mut checks), (source, decoded)| {
            checks.push(manual_check(source, decoded, eligible, &seen));
            seen.insert(source.compact_vin());
            (seen, checks)
        },
    );
    checks
}

/// Review rule for one row; the first matching rule decides.
pub fn manual_check(
    source: &CanonicalRecord,
    decoded: &DecodedResult,
    eligible: &HashSet<String>,
    seen: &HashSet<String>,
) -> ManualCheck {
    let vin = source.compact_vin();
    let already_seen = seen.contains(&vin);
    let model = source.model.to_lowercase();
    let vrn = source.vrn.to_lowercase();

    if eligible.contains(&vin) && !already_seen {
        ManualCheck::No
    } else if decoded.vehicle_type.as_deref() == Some("TRAILER") {
        ManualCheck::No
    } else if model.contains("trailer") || vrn.contains("trailer") {
        ManualCheck::No
    } else if model.contains("lift") || vrn.contains("lift") {
        ManualCheck::No
    } else if source.vin.to_lowercase().contains("example") {
        ManualCheck::No
    } else if already_seen {
        ManualCheck::DuplicateVin
    } else {
        ManualCheck::Yes
    }
}

// =============================================================================
// Vehicle type
// =============================================================================

/// Backfill for a missing or errored remote vehicle type.
///
/// When the remote type is null and the model names neither a trailer nor a
/// lift the result is [`VehicleTypeResolution::Unresolved`]: the null is
/// kept and the caller reports the row.
pub fn resolve_vehicle_type(remote: Option<&str>, model: &str) -> VehicleTypeResolution {
    match remote {
        Some(reported) if reported != ERROR_MARKER => {
            VehicleTypeResolution::Reported(reported.to_string())
        }
        _ => {
            let model = model.to_lowercase();
            if model.contains("trailer") {
                VehicleTypeResolution::InferredTrailer
            } else if model.contains("lift") {
                VehicleTypeResolution::InferredLift
            } else if remote == Some(ERROR_MARKER) {
                VehicleTypeResolution::Unknown
            } else {
                VehicleTypeResolution::Unresolved
            }
        }
    }
}
