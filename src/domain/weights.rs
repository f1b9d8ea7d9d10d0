//! Equal-weight assignment.

use crate::domain::error::IndexError;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Absolute tolerance on the sum of a day's weights.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Give every selected ticker weight `1 / N`.
///
/// The caller guarantees a non-empty selection; an empty one is reported as an
/// invariant violation rather than divided by.
pub fn assign_weights(
    date: NaiveDate,
    selected: &[String],
) -> Result<BTreeMap<String, f64>, IndexError> {
    if selected.is_empty() {
        return Err(IndexError::InvariantViolation {
            date,
            reason: "cannot weight an empty selection".into(),
        });
    }

    let weight = 1.0 / selected.len() as f64;
    let weights: BTreeMap<String, f64> = selected
        .iter()
        .map(|ticker| (ticker.clone(), weight))
        .collect();

    if weights.len() != selected.len() {
        return Err(IndexError::InvariantViolation {
            date,
            reason: "selection contains duplicate tickers".into(),
        });
    }

    check_weight_sum(date, weights.values().copied())?;
    Ok(weights)
}

/// Verify that weights sum to 1 within [`WEIGHT_SUM_TOLERANCE`].
pub fn check_weight_sum(
    date: NaiveDate,
    weights: impl IntoIterator<Item = f64>,
) -> Result<(), IndexError> {
    let total: f64 = weights.into_iter().sum();
    if !total.is_finite() || (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(IndexError::InvariantViolation {
            date,
            reason: format!("weights sum to {total}, expected 1.0"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn tickers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{i:03}")).collect()
    }

    #[test]
    fn two_members_get_half_each() {
        let weights = assign_weights(day(), &["A".to_string(), "B".to_string()]).unwrap();
        assert_abs_diff_eq!(weights["A"], 0.5);
        assert_abs_diff_eq!(weights["B"], 0.5);
    }

    #[test]
    fn hundred_members_sum_to_one() {
        let weights = assign_weights(day(), &tickers(100)).unwrap();
        assert_eq!(weights.len(), 100);
        let total: f64 = weights.values().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn empty_selection_is_rejected() {
        let err = assign_weights(day(), &[]).unwrap_err();
        assert!(matches!(err, IndexError::InvariantViolation { .. }));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = assign_weights(day(), &["A".to_string(), "A".to_string()]).unwrap_err();
        assert!(matches!(err, IndexError::InvariantViolation { .. }));
    }

    #[test]
    fn check_weight_sum_flags_drift() {
        assert!(check_weight_sum(day(), [0.5, 0.5]).is_ok());
        assert!(check_weight_sum(day(), [0.5, 0.4]).is_err());
        assert!(check_weight_sum(day(), [f64::NAN]).is_err());
    }

    proptest! {
        #[test]
        fn weights_always_sum_to_one(n in 1usize..500) {
            let weights = assign_weights(day(), &tickers(n)).unwrap();
            let total: f64 = weights.values().sum();
            prop_assert!((total - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
        }
    }
}
