//! Ranking and selection of index members by market capitalization.

use crate::domain::error::IndexError;
use crate::domain::observation::DailyObservation;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashSet;

pub const DEFAULT_INDEX_SIZE: usize = 100;

/// Rank the day's observations by market cap (descending, ties broken by
/// ticker ascending) and return the first `index_size` tickers.
///
/// Rows without a usable market cap, or dated other than `date`, are ignored.
/// Fails with [`IndexError::NoDataForDate`] when nothing is left to rank.
pub fn select(
    date: NaiveDate,
    observations: &[DailyObservation],
    index_size: usize,
) -> Result<Vec<String>, IndexError> {
    let mut ranked: Vec<(&str, f64)> = observations
        .iter()
        .filter(|obs| obs.date == date)
        .filter_map(|obs| obs.ranking_cap().map(|cap| (obs.ticker.as_str(), cap)))
        .collect();

    if ranked.is_empty() {
        return Err(IndexError::NoDataForDate { date });
    }

    ranked.sort_by(|a, b| rank_order(a, b));

    let mut seen = HashSet::new();
    Ok(ranked
        .into_iter()
        .filter(|(ticker, _)| seen.insert(*ticker))
        .take(index_size)
        .map(|(ticker, _)| ticker.to_string())
        .collect())
}

fn rank_order(a: &(&str, f64), b: &(&str, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn obs(ticker: &str, cap: Option<f64>) -> DailyObservation {
        DailyObservation {
            date: day(),
            ticker: ticker.to_string(),
            open: 10.0,
            high: 10.0,
            low: 10.0,
            close: Some(10.0),
            volume: 100,
            market_cap: cap,
        }
    }

    #[test]
    fn picks_largest_caps_first() {
        let rows = vec![
            obs("A", Some(100.0)),
            obs("C", Some(5.0)),
            obs("B", Some(90.0)),
        ];
        assert_eq!(select(day(), &rows, 2).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn ties_break_by_ticker() {
        let rows = vec![
            obs("ZZZ", Some(50.0)),
            obs("AAA", Some(50.0)),
            obs("MMM", Some(50.0)),
        ];
        assert_eq!(select(day(), &rows, 2).unwrap(), vec!["AAA", "MMM"]);
    }

    #[test]
    fn small_universe_returns_everything() {
        let rows = vec![obs("A", Some(1.0)), obs("B", Some(2.0))];
        assert_eq!(select(day(), &rows, 100).unwrap(), vec!["B", "A"]);
    }

    #[test]
    fn missing_caps_are_skipped() {
        let rows = vec![obs("A", None), obs("B", Some(f64::NAN)), obs("C", Some(3.0))];
        assert_eq!(select(day(), &rows, 100).unwrap(), vec!["C"]);
    }

    #[test]
    fn no_valid_rows_is_no_data() {
        let rows = vec![obs("A", None)];
        let err = select(day(), &rows, 100).unwrap_err();
        assert!(matches!(err, IndexError::NoDataForDate { date } if date == day()));

        let err = select(day(), &[], 100).unwrap_err();
        assert!(matches!(err, IndexError::NoDataForDate { .. }));
    }

    #[test]
    fn other_dates_are_ignored() {
        let mut stale = obs("OLD", Some(1e9));
        stale.date = day().pred_opt().unwrap();
        let rows = vec![stale, obs("NEW", Some(1.0))];
        assert_eq!(select(day(), &rows, 100).unwrap(), vec!["NEW"]);
    }

    #[test]
    fn duplicate_ticker_counted_once() {
        let rows = vec![obs("A", Some(10.0)), obs("A", Some(9.0)), obs("B", Some(8.0))];
        assert_eq!(select(day(), &rows, 2).unwrap(), vec!["A", "B"]);
    }

    proptest! {
        #[test]
        fn selection_never_exceeds_index_size(
            caps in proptest::collection::vec(0.0f64..1e12, 1..250),
            size in 1usize..150,
        ) {
            let rows: Vec<_> = caps
                .iter()
                .enumerate()
                .map(|(i, cap)| obs(&format!("T{i:04}"), Some(*cap)))
                .collect();
            let picked = select(day(), &rows, size).unwrap();
            prop_assert!(picked.len() <= size);
            prop_assert_eq!(picked.len(), size.min(rows.len()));
        }

        #[test]
        fn selection_ignores_input_order(
            caps in proptest::collection::vec(0u32..20, 2..60),
        ) {
            let rows: Vec<_> = caps
                .iter()
                .enumerate()
                .map(|(i, cap)| obs(&format!("T{i:03}"), Some(f64::from(*cap))))
                .collect();
            let mut reversed = rows.clone();
            reversed.reverse();
            prop_assert_eq!(
                select(day(), &rows, 10).unwrap(),
                select(day(), &reversed, 10).unwrap()
            );
        }
    }
}
