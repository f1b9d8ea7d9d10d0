//! Index builder: walks trading dates in ascending order, producing and
//! persisting each day's composition, change events and performance.
//!
//! State carried between days lives in an explicit [`BuildState`], so a single
//! date can be computed in isolation with [`compute_day`]. A build is
//! re-entrant: rebuilding a range overwrites what was stored for it.

use crate::domain::build_guard::BuildLease;
use crate::domain::config_validation::IndexConfig;
use crate::domain::dates::normalize_range;
use crate::domain::differ::{diff, inception_entries};
use crate::domain::error::IndexError;
use crate::domain::observation::DailyObservation;
use crate::domain::records::{CompositionChangeEvent, CompositionEntry, PerformanceRecord};
use crate::domain::returns::{check_compounding, compute_cumulative_return, compute_daily_return};
use crate::domain::selection::select;
use crate::domain::weights::assign_weights;
use crate::ports::store_port::IndexStore;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

/// The last composed trading day, as seen by the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousDay {
    pub date: NaiveDate,
    pub members: BTreeSet<String>,
    /// Closes of `members` on `date`; members without a usable close are absent.
    pub closes: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildState {
    /// `None` at inception and right after a skipped date.
    pub previous: Option<PreviousDay>,
    pub last_cumulative: Option<f64>,
    /// Whether any composition precedes the current date.
    pub has_history: bool,
}

impl BuildState {
    /// Seed state for a build starting at `start` from what is already stored.
    pub fn resume(store: &dyn IndexStore, start: NaiveDate) -> Result<Self, IndexError> {
        let has_history = store.has_composition_before(start)?;
        let last_cumulative = store
            .latest_performance_before(start)?
            .map(|record| record.cumulative_return);

        let previous = match store.previous_trading_date(start)? {
            Some(prev_date) => match store.get_composition(prev_date)? {
                Some(entries) if !entries.is_empty() => {
                    let members: BTreeSet<String> =
                        entries.into_iter().map(|(ticker, _)| ticker).collect();
                    let observations = store.get_observations(prev_date)?;
                    Some(PreviousDay {
                        date: prev_date,
                        closes: member_closes(&observations, &members),
                        members,
                    })
                }
                _ => None,
            },
            None => None,
        };

        Ok(Self {
            previous,
            last_cumulative,
            has_history,
        })
    }

    pub fn advance(&mut self, day: &DayComputation) {
        self.previous = Some(PreviousDay {
            date: day.date,
            members: day.members(),
            closes: day.closes.clone(),
        });
        if let Some(record) = &day.performance {
            self.last_cumulative = Some(record.cumulative_return);
        }
        self.has_history = true;
    }

    /// Forget the previous composition; the next day has no baseline.
    pub fn break_chain(&mut self) {
        self.previous = None;
    }
}

/// Everything derived for one trading day, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct DayComputation {
    pub date: NaiveDate,
    pub composition: Vec<CompositionEntry>,
    pub changes: Vec<CompositionChangeEvent>,
    pub performance: Option<PerformanceRecord>,
    closes: HashMap<String, f64>,
}

impl DayComputation {
    pub fn members(&self) -> BTreeSet<String> {
        self.composition.iter().map(|e| e.ticker.clone()).collect()
    }
}

fn member_closes(
    observations: &[DailyObservation],
    members: &BTreeSet<String>,
) -> HashMap<String, f64> {
    observations
        .iter()
        .filter(|obs| members.contains(&obs.ticker))
        .filter_map(|obs| obs.valid_close().map(|close| (obs.ticker.clone(), close)))
        .collect()
}

/// Select, weight, diff and price one trading day against `state`.
pub fn compute_day(
    date: NaiveDate,
    observations: &[DailyObservation],
    state: &BuildState,
    config: &IndexConfig,
) -> Result<DayComputation, IndexError> {
    let selected = select(date, observations, config.index_size)?;
    if selected.is_empty() {
        return Err(IndexError::NoDataForDate { date });
    }
    if selected.len() > config.index_size {
        return Err(IndexError::InvariantViolation {
            date,
            reason: format!(
                "selected {} members for an index of {}",
                selected.len(),
                config.index_size
            ),
        });
    }

    let weights = assign_weights(date, &selected)?;
    let composition: Vec<CompositionEntry> = selected
        .iter()
        .map(|ticker| CompositionEntry {
            date,
            ticker: ticker.clone(),
            weight: weights[ticker],
        })
        .collect();

    let members: BTreeSet<String> = selected.into_iter().collect();
    let closes = member_closes(observations, &members);

    let changes = match &state.previous {
        Some(prev) => diff(date, &prev.members, &members),
        None if !state.has_history && config.emit_inception_entries => {
            inception_entries(date, &members)
        }
        None => Vec::new(),
    };

    let performance = match &state.previous {
        Some(prev) => {
            let daily_return = compute_daily_return(
                date,
                &weights,
                &prev.closes,
                &closes,
                config.missing_close_policy,
            )?;
            let cumulative_return = compute_cumulative_return(daily_return, state.last_cumulative);
            check_compounding(date, daily_return, state.last_cumulative, cumulative_return)?;
            Some(PerformanceRecord {
                date,
                daily_return,
                cumulative_return,
            })
        }
        None => None,
    };

    Ok(DayComputation {
        date,
        composition,
        changes,
        performance,
        closes,
    })
}

/// Write a day's three record sets. A failure after at least one successful
/// write is reported as [`IndexError::PartialPersistenceFailure`].
pub fn persist_day(store: &dyn IndexStore, day: &DayComputation) -> Result<(), IndexError> {
    let date = day.date;
    let mut written: Vec<&'static str> = Vec::with_capacity(3);

    let steps: [(&'static str, &dyn Fn() -> Result<(), IndexError>); 3] = [
        ("composition", &|| store.put_composition(date, &day.composition)),
        ("changes", &|| store.put_change_events(date, &day.changes)),
        ("performance", &|| match &day.performance {
            Some(record) => store.put_performance(date, record),
            None => store.clear_performance(date),
        }),
    ];

    for (name, write) in steps {
        if let Err(e) = write() {
            if written.is_empty() {
                return Err(e);
            }
            return Err(IndexError::PartialPersistenceFailure {
                date,
                written,
                failed: name,
                reason: e.to_string(),
            });
        }
        written.push(name);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateOutcome {
    Completed {
        date: NaiveDate,
        members: usize,
        change_events: usize,
        performance: Option<PerformanceRecord>,
    },
    Skipped {
        date: NaiveDate,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug)]
pub struct FailedDate {
    pub date: NaiveDate,
    pub error: IndexError,
}

/// Per-date result of a range build.
#[derive(Debug)]
pub struct BuildReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub completed: Vec<NaiveDate>,
    pub skipped: Vec<SkippedDate>,
    /// The date the build stopped at, if it stopped early.
    pub failed: Option<FailedDate>,
    pub performance_records: usize,
    pub change_events: usize,
}

impl BuildReport {
    fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            completed: Vec::new(),
            skipped: Vec::new(),
            failed: None,
            performance_records: 0,
            change_events: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }

    /// Whether the build stopped before the end of the range.
    pub fn aborted(&self) -> bool {
        self.failed.is_some()
    }

    pub fn trading_days(&self) -> usize {
        self.completed.len()
    }
}

pub struct IndexBuilder<'a> {
    store: &'a dyn IndexStore,
    config: IndexConfig,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(store: &'a dyn IndexStore, config: IndexConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Build every trading date in `[start, end]`.
    ///
    /// The range is leased in the store for the whole run, so builders in
    /// other threads or processes sharing the store are refused.
    ///
    /// Returns `Err` only when the build cannot start (conflicting build,
    /// storage unavailable). Per-date problems are recorded in the report: a
    /// date with no valid observations is skipped, any other failure stops
    /// the build at that date.
    pub fn build_range(&self, start: NaiveDate, end: NaiveDate) -> Result<BuildReport, IndexError> {
        let (start, end) = normalize_range(start, end);
        let _lease = BuildLease::acquire(self.store, start, end)?;

        let dates = self.store.trading_dates(start, end)?;
        info!(%start, %end, trading_dates = dates.len(), "building index");

        let mut state = BuildState::resume(self.store, start)?;
        let mut report = BuildReport::new(start, end);

        for date in dates {
            match self.build_date(date, &mut state) {
                Ok(DateOutcome::Completed {
                    change_events,
                    performance,
                    ..
                }) => {
                    report.completed.push(date);
                    report.change_events += change_events;
                    if performance.is_some() {
                        report.performance_records += 1;
                    }
                }
                Ok(DateOutcome::Skipped { date, reason }) => {
                    report.skipped.push(SkippedDate { date, reason });
                }
                Err(e) => {
                    error!(%date, error = %e, retryable = e.is_retryable(), "index build stopped");
                    report.failed = Some(FailedDate { date, error: e });
                    break;
                }
            }
        }

        info!(
            %start,
            %end,
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.is_some(),
            "index build finished"
        );
        Ok(report)
    }

    /// Build one date against `state`, persisting its records and advancing
    /// the state on success.
    pub fn build_date(
        &self,
        date: NaiveDate,
        state: &mut BuildState,
    ) -> Result<DateOutcome, IndexError> {
        let observations = self.store.get_observations(date)?;

        let day = match compute_day(date, &observations, state, &self.config) {
            Ok(day) => day,
            Err(e @ IndexError::NoDataForDate { .. }) => {
                warn!(%date, "no valid observations, skipping date");
                state.break_chain();
                return Ok(DateOutcome::Skipped {
                    date,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        persist_day(self.store, &day)?;
        state.advance(&day);

        debug!(
            %date,
            members = day.composition.len(),
            changes = day.changes.len(),
            daily_return = day.performance.map(|p| p.daily_return),
            "date built"
        );

        Ok(DateOutcome::Completed {
            date,
            members: day.composition.len(),
            change_events: day.changes.len(),
            performance: day.performance,
        })
    }
}
