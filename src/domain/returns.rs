//! Daily and cumulative index returns.
//!
//! A member contributes `weight * (close_today / close_yesterday - 1)`.
//! Members with no prior close (new entrants) contribute zero on their first
//! day and keep their weight. Members with a prior close but no usable close
//! today are handled per [`MissingClosePolicy`].

use crate::domain::error::IndexError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Tolerance for the compounding identity check.
pub const COMPOUNDING_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingClosePolicy {
    /// Drop the member and re-normalize the remaining weights.
    #[default]
    Exclude,
    /// Keep the member's weight with a zero return.
    Zero,
}

impl FromStr for MissingClosePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclude" => Ok(MissingClosePolicy::Exclude),
            "zero" => Ok(MissingClosePolicy::Zero),
            other => Err(format!("expected 'exclude' or 'zero', got '{other}'")),
        }
    }
}

impl fmt::Display for MissingClosePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingClosePolicy::Exclude => f.write_str("exclude"),
            MissingClosePolicy::Zero => f.write_str("zero"),
        }
    }
}

pub fn compute_daily_return(
    date: NaiveDate,
    current_weights: &BTreeMap<String, f64>,
    prior_close_by_ticker: &HashMap<String, f64>,
    current_close_by_ticker: &HashMap<String, f64>,
    policy: MissingClosePolicy,
) -> Result<f64, IndexError> {
    let mut weighted = 0.0_f64;
    let mut priced_weight = 0.0_f64;

    for (ticker, weight) in current_weights {
        let today = current_close_by_ticker.get(ticker).copied().filter(|c| *c > 0.0);
        let prior = prior_close_by_ticker.get(ticker).copied().filter(|c| *c > 0.0);

        match (prior, today) {
            (Some(prev), Some(close)) => {
                weighted += weight * (close / prev - 1.0);
                priced_weight += weight;
            }
            (None, Some(_)) => priced_weight += weight,
            (_, None) => {
                if policy == MissingClosePolicy::Zero {
                    priced_weight += weight;
                }
            }
        }
    }

    let daily = match policy {
        MissingClosePolicy::Zero => weighted,
        MissingClosePolicy::Exclude if priced_weight > 0.0 => {
            let total: f64 = current_weights.values().sum();
            weighted * total / priced_weight
        }
        MissingClosePolicy::Exclude => 0.0,
    };

    if !daily.is_finite() {
        return Err(IndexError::InvariantViolation {
            date,
            reason: format!("daily return is not finite ({daily})"),
        });
    }
    Ok(daily)
}

/// `(1 + previous) * (1 + daily) - 1`; with no previous record the index
/// starts from zero and the cumulative return equals the daily return.
pub fn compute_cumulative_return(
    daily_return: f64,
    previous_cumulative_return: Option<f64>,
) -> f64 {
    match previous_cumulative_return {
        Some(prev) => (1.0 + prev) * (1.0 + daily_return) - 1.0,
        None => daily_return,
    }
}

/// Check a cumulative return against the chain it extends: the index level
/// `1 + cumulative` must stay positive and finite, and dividing it by the
/// previous level must give back the daily return.
pub fn check_compounding(
    date: NaiveDate,
    daily_return: f64,
    previous_cumulative_return: Option<f64>,
    cumulative_return: f64,
) -> Result<(), IndexError> {
    let level = 1.0 + cumulative_return;
    let previous_level = 1.0 + previous_cumulative_return.unwrap_or(0.0);
    if !level.is_finite() || level <= 0.0 || previous_level <= 0.0 {
        return Err(IndexError::InvariantViolation {
            date,
            reason: format!("index level {level} after {previous_level} is not positive"),
        });
    }

    let implied = level / previous_level - 1.0;
    if (implied - daily_return).abs() > COMPOUNDING_TOLERANCE * (1.0 + daily_return.abs()) {
        return Err(IndexError::InvariantViolation {
            date,
            reason: format!(
                "cumulative return {cumulative_return} implies a daily return of {implied}, \
                 not {daily_return}"
            ),
        });
    }
    Ok(())
}
