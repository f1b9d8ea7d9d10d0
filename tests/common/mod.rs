#![allow(dead_code)]

use chrono::NaiveDate;
use eqindex::adapters::memory_store::MemoryStore;
use eqindex::domain::build_guard::LeaseId;
use eqindex::domain::error::IndexError;
pub use eqindex::domain::observation::{DailyObservation, Stock};
use eqindex::domain::records::{
    ChangeDetail, CompositionChangeEvent, CompositionDetail, CompositionEntry, PerformanceRecord,
};
use eqindex::ports::store_port::IndexStore;
use std::sync::{Arc, Barrier, Mutex};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A date in January 2024.
pub fn jan(day: u32) -> NaiveDate {
    date(2024, 1, day)
}

pub fn obs(date: NaiveDate, ticker: &str, market_cap: f64, close: f64) -> DailyObservation {
    DailyObservation {
        date,
        ticker: ticker.to_string(),
        open: close,
        high: close,
        low: close,
        close: Some(close),
        volume: 10_000,
        market_cap: Some(market_cap),
    }
}

/// `count` tickers `T000..` with strictly decreasing caps and a shared close.
pub fn universe(date: NaiveDate, count: usize, close: f64) -> Vec<DailyObservation> {
    (0..count)
        .map(|i| obs(date, &format!("T{i:03}"), 1.0e12 - i as f64 * 1.0e9, close))
        .collect()
}

/// The three-day example: A/B/C on day one, D overtakes B on day two.
pub fn scenario() -> Vec<DailyObservation> {
    vec![
        obs(jan(2), "A", 100.0, 10.0),
        obs(jan(2), "B", 90.0, 20.0),
        obs(jan(2), "C", 5.0, 5.0),
        obs(jan(3), "A", 100.0, 11.0),
        obs(jan(3), "B", 80.0, 18.0),
        obs(jan(3), "C", 5.0, 5.0),
        obs(jan(3), "D", 95.0, 9.0),
    ]
}

pub fn seeded_store(observations: &[DailyObservation]) -> MemoryStore {
    let store = MemoryStore::new();
    store.upsert_observations(observations).unwrap();
    store
}

/// Which write a [`FailingStore`] should refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingWrite {
    Composition,
    Changes,
    Performance,
}

/// Delegates to a [`MemoryStore`] but fails one kind of write on one date,
/// or holds the first build in flight at a barrier.
pub struct FailingStore {
    pub inner: MemoryStore,
    failure: Mutex<Option<(FailingWrite, NaiveDate)>>,
    gate: Mutex<Option<Arc<Barrier>>>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            failure: Mutex::new(None),
            gate: Mutex::new(None),
        }
    }

    /// The first `trading_dates` call waits on `barrier` twice: once on
    /// arrival and once before returning.
    pub fn gate_listing(self, barrier: Arc<Barrier>) -> Self {
        *self.gate.lock().unwrap() = Some(barrier);
        self
    }

    pub fn fail_on(self, write: FailingWrite, date: NaiveDate) -> Self {
        *self.failure.lock().unwrap() = Some((write, date));
        self
    }

    pub fn heal(&self) {
        *self.failure.lock().unwrap() = None;
    }

    fn check(&self, write: FailingWrite, date: NaiveDate) -> Result<(), IndexError> {
        if *self.failure.lock().unwrap() == Some((write, date)) {
            return Err(IndexError::Database {
                reason: format!("injected {write:?} failure"),
            });
        }
        Ok(())
    }
}

impl IndexStore for FailingStore {
    fn get_observations(&self, date: NaiveDate) -> Result<Vec<DailyObservation>, IndexError> {
        self.inner.get_observations(date)
    }

    fn trading_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, IndexError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(barrier) = gate {
            barrier.wait();
            barrier.wait();
        }
        self.inner.trading_dates(start, end)
    }

    fn previous_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>, IndexError> {
        self.inner.previous_trading_date(date)
    }

    fn last_trading_date(&self) -> Result<Option<NaiveDate>, IndexError> {
        self.inner.last_trading_date()
    }

    fn get_composition(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Vec<(String, f64)>>, IndexError> {
        self.inner.get_composition(date)
    }

    fn has_composition_before(&self, date: NaiveDate) -> Result<bool, IndexError> {
        self.inner.has_composition_before(date)
    }

    fn put_composition(
        &self,
        date: NaiveDate,
        entries: &[CompositionEntry],
    ) -> Result<(), IndexError> {
        self.check(FailingWrite::Composition, date)?;
        self.inner.put_composition(date, entries)
    }

    fn put_change_events(
        &self,
        date: NaiveDate,
        events: &[CompositionChangeEvent],
    ) -> Result<(), IndexError> {
        self.check(FailingWrite::Changes, date)?;
        self.inner.put_change_events(date, events)
    }

    fn put_performance(
        &self,
        date: NaiveDate,
        record: &PerformanceRecord,
    ) -> Result<(), IndexError> {
        self.check(FailingWrite::Performance, date)?;
        self.inner.put_performance(date, record)
    }

    fn get_performance(&self, date: NaiveDate) -> Result<Option<PerformanceRecord>, IndexError> {
        self.inner.get_performance(date)
    }

    fn clear_performance(&self, date: NaiveDate) -> Result<(), IndexError> {
        self.check(FailingWrite::Performance, date)?;
        self.inner.clear_performance(date)
    }

    fn latest_performance_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, IndexError> {
        self.inner.latest_performance_before(date)
    }

    fn performance_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, IndexError> {
        self.inner.performance_range(start, end)
    }

    fn composition_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositionEntry>, IndexError> {
        self.inner.composition_range(start, end)
    }

    fn composition_detail(&self, date: NaiveDate) -> Result<Vec<CompositionDetail>, IndexError> {
        self.inner.composition_detail(date)
    }

    fn changes_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ChangeDetail>, IndexError> {
        self.inner.changes_range(start, end)
    }

    fn upsert_stocks(&self, stocks: &[Stock]) -> Result<(), IndexError> {
        self.inner.upsert_stocks(stocks)
    }

    fn upsert_observations(&self, observations: &[DailyObservation]) -> Result<(), IndexError> {
        self.inner.upsert_observations(observations)
    }

    fn acquire_build_lease(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LeaseId, IndexError> {
        self.inner.acquire_build_lease(start, end)
    }

    fn release_build_lease(&self, lease: LeaseId) -> Result<(), IndexError> {
        self.inner.release_build_lease(lease)
    }
}
