//! Activity identifiers: `Y{YY}-{NNNNNN}`.
//!
//! The two-digit year prefix only disambiguates inside one century, so planning
//! years are restricted to 2000..=2099. The sequence part is allocated by the
//! store (see `tracker_db::repository::activity`); this module only formats
//! and parses.

use crate::error::{Error, Result};

pub const MIN_PLANNING_YEAR: i32 = 2000;
pub const MAX_PLANNING_YEAR: i32 = 2099;
pub const MAX_SEQUENCE: i64 = 999_999;

pub fn validate_planning_year(year: i32) -> Result<()> {
    if !(MIN_PLANNING_YEAR..=MAX_PLANNING_YEAR).contains(&year) {
        return Err(Error::Validation(format!(
            "planning year {} is outside {}..={}",
            year, MIN_PLANNING_YEAR, MAX_PLANNING_YEAR
        )));
    }
    Ok(())
}

pub fn format_activity_id(year: i32, sequence: i64) -> Result<String> {
    validate_planning_year(year)?;
    if !(1..=MAX_SEQUENCE).contains(&sequence) {
        return Err(Error::Validation(format!(
            "sequence {} for year {} exceeds the six-digit identifier space",
            sequence, year
        )));
    }
    Ok(format!("Y{:02}-{:06}", year % 100, sequence))
}

/// Splits an identifier into its two-digit year suffix and sequence number.
pub fn parse_activity_id(id: &str) -> Option<(u8, i64)> {
    let rest = id.strip_prefix('Y')?;
    let (yy, seq) = rest.split_once('-')?;
    if yy.len() != 2 || seq.len() != 6 {
        return None;
    }
    if !yy.bytes().all(|b| b.is_ascii_digit()) || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((yy.parse().ok()?, seq.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_two_digit_year_and_padding() {
        assert_eq!(format_activity_id(2026, 1).unwrap(), "Y26-000001");
        assert_eq!(format_activity_id(2005, 42).unwrap(), "Y05-000042");
        assert_eq!(format_activity_id(2099, 999_999).unwrap(), "Y99-999999");
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        assert!(format_activity_id(1999, 1).is_err());
        assert!(format_activity_id(2100, 1).is_err());
        assert!(format_activity_id(2026, 0).is_err());
        assert!(format_activity_id(2026, 1_000_000).is_err());
    }

    #[test]
    fn parses_well_formed_ids_only() {
        assert_eq!(parse_activity_id("Y26-000123"), Some((26, 123)));
        assert_eq!(parse_activity_id("Y26-123"), None);
        assert_eq!(parse_activity_id("X26-000123"), None);
        assert_eq!(parse_activity_id("Y2A-000123"), None);
    }
}
