//! VIN sanity checks.
//!
//! Advisory only: the pipeline logs and counts VINs failing these checks
//! but still sends them to the decode service and classifies them as usual.
//!
//! Checks, for a space-stripped VIN:
//! - exactly 17 characters
//! - only `A-Z` and `0-9`, excluding `I`, `O` and `Q`
//! - position 9 holds the check digit (ISO 3779 / 49 CFR 565 weighting)
//!
//! # Example
//!
//! ```rust,ignore
//! use autovin::validation::{is_valid_vin, validate_vin};
//!
//! assert!(is_valid_vin("1HGCM82633A004352"));
//! assert!(validate_vin("1HGCM82633A004353").is_err());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Length of a modern VIN
pub const VIN_LENGTH: usize = 17;

static VIN_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-HJ-NPR-Z0-9]+$").expect("Invalid VIN regex"));

/// Position weights for the check digit.
const WEIGHTS: [u32; VIN_LENGTH] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

/// Numeric value of a VIN character.
fn transliterate(c: char) -> Option<u32> {
    let value = match c {
        '0'..='9' => c.to_digit(10)?,
        'A' | 'J' => 1,
        'B' | 'K' | 'S' => 2,
        'C' | 'L' | 'T' => 3,
        'D' | 'M' | 'U' => 4,
        'E' | 'N' | 'V' => 5,
        'F' | 'W' => 6,
        'G' | 'P' | 'X' => 7,
        'H' | 'Y' => 8,
        'R' | 'Z' => 9,
        _ => return None,
    };
    Some(value)
}

/// Expected check digit for a 17-character VIN.
pub fn check_digit(vin: &str) -> Option<char> {
    if vin.chars().count() != VIN_LENGTH {
        return None;
    }

    let mut sum = 0;
    for (c, weight) in vin.chars().zip(WEIGHTS) {
        sum += transliterate(c)? * weight;
    }

    match sum % 11 {
        10 => Some('X'),
        n => char::from_digit(n, 10),
    }
}

/// Validate a VIN, returning every problem found.
pub fn validate_vin(vin: &str) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let upper = vin.to_uppercase();

    let length = upper.chars().count();
    if length != VIN_LENGTH {
        errors.push(format!("expected {} characters, found {}", VIN_LENGTH, length));
    }

    if !VIN_CHARSET.is_match(&upper) {
        errors.push("contains characters outside A-Z/0-9 or I, O, Q".to_string());
    }

    if errors.is_empty() {
        let expected = check_digit(&upper);
        let actual = upper.chars().nth(8);
        if expected != actual {
            errors.push(format!(
                "check digit is '{}', expected '{}'",
                actual.unwrap_or('?'),
                expected.unwrap_or('?')
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check: true/false.
pub fn is_valid_vin(vin: &str) -> bool {
    validate_vin(vin).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_good_vins() {
        assert!(is_valid_vin("1HGCM82633A004352"));
        assert!(is_valid_vin("1M8GDM9AXKP042788"));
        assert!(is_valid_vin("3FAHP0HA7AR000001"));
    }

    #[test]
    fn test_lowercase_is_accepted() {
        assert!(is_valid_vin("1hgcm82633a004352"));
    }

    #[test]
    fn test_wrong_check_digit() {
        let errors = validate_vin("1HGCM82633A004353").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expected '5'"));
    }

    #[test]
    fn test_wrong_length_and_charset() {
        let errors = validate_vin("EXAMPLE-VIN").unwrap_err();
        assert!(errors.iter().any(|e| e.contains("17 characters")));
        assert!(errors.iter().any(|e| e.contains("outside")));
    }

    #[test]
    fn test_excluded_letters() {
        let errors = validate_vin("1HGCM82633A00435O").unwrap_err();
        assert!(errors[0].contains("outside"));
    }

    #[test]
    fn test_check_digit_x() {
        assert_eq!(check_digit("1M8GDM9AXKP042788"), Some('X'));
    }
}
