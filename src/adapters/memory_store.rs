//! In-process index store with the same overwrite semantics as the SQLite store.

use crate::domain::build_guard::{BuildGuard, LeaseId};
use crate::domain::error::IndexError;
use crate::domain::observation::{DailyObservation, Stock};
use crate::domain::records::{
    ChangeDetail, CompositionChangeEvent, CompositionDetail, CompositionEntry, PerformanceRecord,
};
use crate::ports::store_port::IndexStore;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Tables {
    stocks: BTreeMap<String, Stock>,
    observations: BTreeMap<NaiveDate, BTreeMap<String, DailyObservation>>,
    compositions: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
    changes: BTreeMap<NaiveDate, Vec<CompositionChangeEvent>>,
    performance: BTreeMap<NaiveDate, PerformanceRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    leases: BuildGuard,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stock_meta(tables: &Tables, ticker: &str) -> (Option<String>, Option<String>) {
        tables
            .stocks
            .get(ticker)
            .map(|s| (s.name.clone(), s.sector.clone()))
            .unwrap_or((None, None))
    }
}

impl IndexStore for MemoryStore {
    fn get_observations(&self, date: NaiveDate) -> Result<Vec<DailyObservation>, IndexError> {
        Ok(self
            .tables()
            .observations
            .get(&date)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    fn trading_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, IndexError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .tables()
            .observations
            .range(start..=end)
            .map(|(date, _)| *date)
            .collect())
    }

    fn previous_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>, IndexError> {
        Ok(self
            .tables()
            .observations
            .range(..date)
            .next_back()
            .map(|(d, _)| *d))
    }

    fn last_trading_date(&self) -> Result<Option<NaiveDate>, IndexError> {
        Ok(self.tables().observations.keys().next_back().copied())
    }

    fn get_composition(&self, date: NaiveDate) -> Result<Option<Vec<(String, f64)>>, IndexError> {
        Ok(self
            .tables()
            .compositions
            .get(&date)
            .map(|rows| rows.iter().map(|(t, w)| (t.clone(), *w)).collect()))
    }

    fn has_composition_before(&self, date: NaiveDate) -> Result<bool, IndexError> {
        Ok(self.tables().compositions.range(..date).next().is_some())
    }

    fn put_composition(
        &self,
        date: NaiveDate,
        entries: &[CompositionEntry],
    ) -> Result<(), IndexError> {
        let mut tables = self.tables();
        for entry in entries {
            if !tables.stocks.contains_key(&entry.ticker) {
                return Err(IndexError::DatabaseQuery {
                    reason: format!("unknown ticker {} in composition", entry.ticker),
                });
            }
        }
        let rows = entries
            .iter()
            .map(|e| (e.ticker.clone(), e.weight))
            .collect();
        tables.compositions.insert(date, rows);
        Ok(())
    }

    fn put_change_events(
        &self,
        date: NaiveDate,
        events: &[CompositionChangeEvent],
    ) -> Result<(), IndexError> {
        let mut tables = self.tables();
        if events.is_empty() {
            tables.changes.remove(&date);
        } else {
            let mut by_ticker: BTreeMap<String, CompositionChangeEvent> = BTreeMap::new();
            for event in events {
                by_ticker.insert(event.ticker.clone(), event.clone());
            }
            tables.changes.insert(date, by_ticker.into_values().collect());
        }
        Ok(())
    }

    fn put_performance(
        &self,
        date: NaiveDate,
        record: &PerformanceRecord,
    ) -> Result<(), IndexError> {
        self.tables().performance.insert(date, *record);
        Ok(())
    }

    fn get_performance(&self, date: NaiveDate) -> Result<Option<PerformanceRecord>, IndexError> {
        Ok(self.tables().performance.get(&date).copied())
    }

    fn clear_performance(&self, date: NaiveDate) -> Result<(), IndexError> {
        self.tables().performance.remove(&date);
        Ok(())
    }

    fn latest_performance_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, IndexError> {
        Ok(self
            .tables()
            .performance
            .range(..date)
            .next_back()
            .map(|(_, r)| *r))
    }

    fn performance_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, IndexError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .tables()
            .performance
            .range(start..=end)
            .map(|(_, r)| *r)
            .collect())
    }

    fn composition_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositionEntry>, IndexError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .tables()
            .compositions
            .range(start..=end)
            .flat_map(|(date, rows)| {
                rows.iter().map(move |(ticker, weight)| CompositionEntry {
                    date: *date,
                    ticker: ticker.clone(),
                    weight: *weight,
                })
            })
            .collect())
    }

    fn composition_detail(&self, date: NaiveDate) -> Result<Vec<CompositionDetail>, IndexError> {
        let tables = self.tables();
        let Some(rows) = tables.compositions.get(&date) else {
            return Ok(Vec::new());
        };
        let observations = tables.observations.get(&date);

        let mut details: Vec<CompositionDetail> = rows
            .iter()
            .map(|(ticker, weight)| {
                let (name, sector) = Self::stock_meta(&tables, ticker);
                let obs = observations.and_then(|o| o.get(ticker));
                CompositionDetail {
                    ticker: ticker.clone(),
                    name,
                    sector,
                    weight: *weight,
                    close: obs.and_then(|o| o.close),
                    market_cap: obs.and_then(|o| o.market_cap),
                }
            })
            .collect();
        details.sort_by(|a, b| {
            b.market_cap
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&a.market_cap.unwrap_or(f64::NEG_INFINITY))
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        Ok(details)
    }

    fn changes_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ChangeDetail>, IndexError> {
        if start > end {
            return Ok(Vec::new());
        }
        let tables = self.tables();
        let mut details: Vec<ChangeDetail> = tables
            .changes
            .range(start..=end)
            .flat_map(|(_, events)| events.iter())
            .map(|event| {
                let (name, sector) = Self::stock_meta(&tables, &event.ticker);
                ChangeDetail {
                    date: event.date,
                    ticker: event.ticker.clone(),
                    name,
                    sector,
                    event: event.event,
                }
            })
            .collect();
        details.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.event.cmp(&b.event))
                .then_with(|| a.ticker.cmp(&b.ticker))
        });
        Ok(details)
    }

    fn upsert_stocks(&self, stocks: &[Stock]) -> Result<(), IndexError> {
        let mut tables = self.tables();
        for stock in stocks {
            tables.stocks.insert(stock.ticker.clone(), stock.clone());
        }
        Ok(())
    }

    fn upsert_observations(&self, observations: &[DailyObservation]) -> Result<(), IndexError> {
        let mut tables = self.tables();
        for obs in observations {
            tables
                .stocks
                .entry(obs.ticker.clone())
                .or_insert_with(|| Stock::bare(&obs.ticker));
            tables
                .observations
                .entry(obs.date)
                .or_default()
                .insert(obs.ticker.clone(), obs.clone());
        }
        Ok(())
    }

    fn acquire_build_lease(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LeaseId, IndexError> {
        self.leases.acquire(start, end)
    }

    fn release_build_lease(&self, lease: LeaseId) -> Result<(), IndexError> {
        self.leases.release(lease);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::records::ChangeKind;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn obs(date: NaiveDate, ticker: &str, cap: f64) -> DailyObservation {
        DailyObservation {
            date,
            ticker: ticker.into(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: Some(1.0),
            volume: 1,
            market_cap: Some(cap),
        }
    }

    fn entry(date: NaiveDate, ticker: &str, weight: f64) -> CompositionEntry {
        CompositionEntry {
            date,
            ticker: ticker.into(),
            weight,
        }
    }

    #[test]
    fn trading_dates_are_sorted_and_bounded() {
        let store = MemoryStore::new();
        store
            .upsert_observations(&[obs(d(5), "A", 1.0), obs(d(2), "A", 1.0), obs(d(9), "A", 1.0)])
            .unwrap();
        assert_eq!(store.trading_dates(d(1), d(6)).unwrap(), vec![d(2), d(5)]);
        assert_eq!(store.previous_trading_date(d(5)).unwrap(), Some(d(2)));
        assert_eq!(store.previous_trading_date(d(2)).unwrap(), None);
        assert_eq!(store.last_trading_date().unwrap(), Some(d(9)));
    }

    #[test]
    fn composition_write_replaces_the_date() {
        let store = MemoryStore::new();
        store
            .upsert_observations(&[obs(d(1), "A", 2.0), obs(d(1), "B", 1.0)])
            .unwrap();
        store
            .put_composition(d(1), &[entry(d(1), "A", 0.5), entry(d(1), "B", 0.5)])
            .unwrap();
        store.put_composition(d(1), &[entry(d(1), "A", 1.0)]).unwrap();
        assert_eq!(
            store.get_composition(d(1)).unwrap(),
            Some(vec![("A".to_string(), 1.0)])
        );
        assert_eq!(store.composition_range(d(1), d(1)).unwrap().len(), 1);
    }

    #[test]
    fn composition_requires_known_ticker() {
        let store = MemoryStore::new();
        let err = store
            .put_composition(d(1), &[entry(d(1), "ZZZ", 1.0)])
            .unwrap_err();
        assert!(matches!(err, IndexError::DatabaseQuery { .. }));
    }

    #[test]
    fn empty_change_write_clears_date() {
        let store = MemoryStore::new();
        let event = CompositionChangeEvent {
            date: d(2),
            ticker: "A".into(),
            event: ChangeKind::Entry,
        };
        store.put_change_events(d(2), &[event]).unwrap();
        assert_eq!(store.changes_range(d(1), d(3)).unwrap().len(), 1);
        store.put_change_events(d(2), &[]).unwrap();
        assert!(store.changes_range(d(1), d(3)).unwrap().is_empty());
    }

    #[test]
    fn detail_orders_by_market_cap() {
        let store = MemoryStore::new();
        store
            .upsert_stocks(&[Stock {
                ticker: "B".into(),
                name: Some("Bravo".into()),
                sector: Some("Tech".into()),
                exchange: None,
            }])
            .unwrap();
        store
            .upsert_observations(&[obs(d(1), "A", 1.0), obs(d(1), "B", 9.0)])
            .unwrap();
        store
            .put_composition(d(1), &[entry(d(1), "A", 0.5), entry(d(1), "B", 0.5)])
            .unwrap();
        let detail = store.composition_detail(d(1)).unwrap();
        assert_eq!(detail[0].ticker, "B");
        assert_eq!(detail[0].name.as_deref(), Some("Bravo"));
        assert_eq!(detail[1].ticker, "A");
        assert_eq!(detail[1].name, None);
    }

    #[test]
    fn latest_performance_before_skips_same_day() {
        let store = MemoryStore::new();
        let rec = |date, c| PerformanceRecord {
            date,
            daily_return: 0.0,
            cumulative_return: c,
        };
        store.put_performance(d(2), &rec(d(2), 0.1)).unwrap();
        store.put_performance(d(3), &rec(d(3), 0.2)).unwrap();
        assert_eq!(
            store.latest_performance_before(d(3)).unwrap().map(|r| r.cumulative_return),
            Some(0.1)
        );
        assert!(store.index_exists_for_range(d(1), d(2)).unwrap());
        assert!(!store.index_exists_for_range(d(4), d(9)).unwrap());
        store.clear_performance(d(2)).unwrap();
        assert!(store.get_performance(d(2)).unwrap().is_none());
        assert!(store.latest_performance_before(d(3)).unwrap().is_none());
    }
}
