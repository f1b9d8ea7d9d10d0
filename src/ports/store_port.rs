//! Index storage port.
//!
//! All writes overwrite on their primary key: `(date, ticker)` for
//! composition and change rows, `date` for performance rows. Composition and
//! change writes replace every row stored for the date.
//!
//! Build leases are held in the store so that builders in different
//! processes sharing one database exclude each other.

use crate::domain::build_guard::LeaseId;
use crate::domain::error::IndexError;
use crate::domain::observation::{DailyObservation, Stock};
use crate::domain::records::{
    ChangeDetail, CompositionChangeEvent, CompositionDetail, CompositionEntry, PerformanceRecord,
};
use chrono::NaiveDate;

pub trait IndexStore {
    fn get_observations(&self, date: NaiveDate) -> Result<Vec<DailyObservation>, IndexError>;

    /// Distinct observation dates in `[start, end]`, ascending.
    fn trading_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, IndexError>;

    /// Latest observation date strictly before `date`.
    fn previous_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>, IndexError>;

    /// Latest observation date overall.
    fn last_trading_date(&self) -> Result<Option<NaiveDate>, IndexError>;

    fn get_composition(&self, date: NaiveDate)
        -> Result<Option<Vec<(String, f64)>>, IndexError>;

    /// Whether any composition is stored for a date strictly before `date`.
    fn has_composition_before(&self, date: NaiveDate) -> Result<bool, IndexError>;

    fn put_composition(
        &self,
        date: NaiveDate,
        entries: &[CompositionEntry],
    ) -> Result<(), IndexError>;

    fn put_change_events(
        &self,
        date: NaiveDate,
        events: &[CompositionChangeEvent],
    ) -> Result<(), IndexError>;

    fn put_performance(&self, date: NaiveDate, record: &PerformanceRecord)
        -> Result<(), IndexError>;

    fn get_performance(&self, date: NaiveDate) -> Result<Option<PerformanceRecord>, IndexError>;

    /// Remove any performance row for `date`.
    fn clear_performance(&self, date: NaiveDate) -> Result<(), IndexError>;

    /// Most recent performance row strictly before `date`.
    fn latest_performance_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, IndexError>;

    fn performance_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, IndexError>;

    fn composition_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositionEntry>, IndexError>;

    /// Composition for `date` joined with stock metadata, largest market cap first.
    fn composition_detail(&self, date: NaiveDate) -> Result<Vec<CompositionDetail>, IndexError>;

    /// Change events in range ordered by date, EXIT before ENTRY, then ticker.
    fn changes_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ChangeDetail>, IndexError>;

    /// Whether any performance row is stored in `[start, end]`.
    fn index_exists_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<bool, IndexError> {
        Ok(!self.performance_range(start, end)?.is_empty())
    }

    /// Register an in-flight build over `[start, end]`. Fails with
    /// `ConcurrentBuildConflict` when a held lease overlaps the range or sits
    /// within `ADJACENCY_DAYS` of it.
    fn acquire_build_lease(&self, start: NaiveDate, end: NaiveDate)
        -> Result<LeaseId, IndexError>;

    fn release_build_lease(&self, lease: LeaseId) -> Result<(), IndexError>;

    fn upsert_stocks(&self, stocks: &[Stock]) -> Result<(), IndexError>;

    /// Insert or replace observations; unknown tickers get a bare stock row.
    fn upsert_observations(&self, observations: &[DailyObservation]) -> Result<(), IndexError>;
}
