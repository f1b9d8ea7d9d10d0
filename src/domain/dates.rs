//! Date parsing and range normalization.

use crate::domain::error::IndexError;
use chrono::NaiveDate;
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> Result<NaiveDate, IndexError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| IndexError::InvalidDateRange {
        reason: format!("'{value}' is not a YYYY-MM-DD date: {e}"),
    })
}

/// Order a requested range; a reversed range is swapped rather than rejected.
pub fn normalize_range(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    if start > end {
        warn!(%start, %end, "start date is after end date, swapping");
        (end, start)
    } else {
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date(" 2024-02-29 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn rejects_other_formats() {
        let err = parse_date("2024/02/29").unwrap_err();
        assert!(matches!(err, IndexError::InvalidDateRange { .. }));
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn reversed_range_is_swapped() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(normalize_range(b, a), (a, b));
        assert_eq!(normalize_range(a, b), (a, b));
        assert_eq!(normalize_range(a, a), (a, a));
    }
}
