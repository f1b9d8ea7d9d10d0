//! Composition differ: ENTRY/EXIT events between consecutive trading days.
//!
//! Events for one date are ordered EXIT first, then ENTRY, each group sorted
//! by ticker.

use crate::domain::records::{ChangeKind, CompositionChangeEvent};
use chrono::NaiveDate;
use std::collections::BTreeSet;

pub fn diff(
    date: NaiveDate,
    previous: &BTreeSet<String>,
    current: &BTreeSet<String>,
) -> Vec<CompositionChangeEvent> {
    let exits = previous
        .difference(current)
        .map(|ticker| event(date, ticker, ChangeKind::Exit));
    let entries = current
        .difference(previous)
        .map(|ticker| event(date, ticker, ChangeKind::Entry));
    exits.chain(entries).collect()
}

/// Every member as an ENTRY; used at inception when configured to do so.
pub fn inception_entries(
    date: NaiveDate,
    current: &BTreeSet<String>,
) -> Vec<CompositionChangeEvent> {
    current
        .iter()
        .map(|ticker| event(date, ticker, ChangeKind::Entry))
        .collect()
}

fn event(date: NaiveDate, ticker: &str, kind: ChangeKind) -> CompositionChangeEvent {
    CompositionChangeEvent {
        date,
        ticker: ticker.to_string(),
        event: kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn replacement_yields_exit_then_entry() {
        let events = diff(day(), &set(&["A", "B"]), &set(&["A", "D"]));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].ticker, "B");
        assert_eq!(events[0].event, ChangeKind::Exit);
        assert_eq!(events[1].ticker, "D");
        assert_eq!(events[1].event, ChangeKind::Entry);
        assert!(events.iter().all(|e| e.date == day()));
    }

    #[test]
    fn unchanged_composition_has_no_events() {
        assert!(diff(day(), &set(&["A", "B"]), &set(&["B", "A"])).is_empty());
    }

    #[test]
    fn inception_lists_every_member() {
        let events = inception_entries(day(), &set(&["B", "A"]));
        let tickers: Vec<_> = events.iter().map(|e| e.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["A", "B"]);
        assert!(events.iter().all(|e| e.event == ChangeKind::Entry));
    }

    proptest! {
        #[test]
        fn diff_is_complete_and_disjoint(
            prev in proptest::collection::btree_set("[A-H]", 0..8),
            curr in proptest::collection::btree_set("[A-H]", 0..8),
        ) {
            let events = diff(day(), &prev, &curr);
            let exits: BTreeSet<String> = events
                .iter()
                .filter(|e| e.event == ChangeKind::Exit)
                .map(|e| e.ticker.clone())
                .collect();
            let entries: BTreeSet<String> = events
                .iter()
                .filter(|e| e.event == ChangeKind::Entry)
                .map(|e| e.ticker.clone())
                .collect();

            let removed: BTreeSet<String> = prev.difference(&curr).cloned().collect();
            let added: BTreeSet<String> = curr.difference(&prev).cloned().collect();
            prop_assert_eq!(&exits, &removed);
            prop_assert_eq!(&entries, &added);
            prop_assert!(exits.is_disjoint(&entries));

            let first_entry = events.iter().position(|e| e.event == ChangeKind::Entry);
            let last_exit = events.iter().rposition(|e| e.event == ChangeKind::Exit);
            if let (Some(entry), Some(exit)) = (first_entry, last_exit) {
                prop_assert!(exit < entry);
            }
        }
    }
}
