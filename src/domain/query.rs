//! Read paths over built index data, fronted by the advisory cache.

use crate::domain::error::IndexError;
use crate::domain::records::{ChangeDetail, CompositionDetail, PerformanceRecord};
use crate::ports::cache_port::CachePort;
use crate::ports::store_port::IndexStore;
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub const PERFORMANCE_PREFIX: &str = "index_performance";
pub const COMPOSITION_PREFIX: &str = "index_composition";
pub const CHANGES_PREFIX: &str = "composition_changes";

/// Deterministic cache key for an operation over a date range.
pub fn cache_key(operation: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!("{operation}:{start}:{end}")
}

pub struct IndexQueries<'a> {
    store: &'a dyn IndexStore,
    cache: &'a dyn CachePort,
}

impl<'a> IndexQueries<'a> {
    pub fn new(store: &'a dyn IndexStore, cache: &'a dyn CachePort) -> Self {
        Self { store, cache }
    }

    pub fn performance(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, IndexError> {
        self.cached(&cache_key(PERFORMANCE_PREFIX, start, end), || {
            self.store.performance_range(start, end)
        })
    }

    pub fn composition(&self, date: NaiveDate) -> Result<Vec<CompositionDetail>, IndexError> {
        self.cached(&cache_key(COMPOSITION_PREFIX, date, date), || {
            self.store.composition_detail(date)
        })
    }

    pub fn changes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ChangeDetail>, IndexError> {
        self.cached(&cache_key(CHANGES_PREFIX, start, end), || {
            self.store.changes_range(start, end)
        })
    }

    /// Drop every cached read; called after any build that wrote data.
    pub fn invalidate_all(&self) {
        let removed: usize = [PERFORMANCE_PREFIX, COMPOSITION_PREFIX, CHANGES_PREFIX]
            .iter()
            .map(|prefix| self.cache.invalidate_prefix(&format!("{prefix}:")))
            .sum();
        info!(removed, "invalidated cached index reads");
    }

    fn cached<T, F>(&self, key: &str, load: F) -> Result<T, IndexError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, IndexError>,
    {
        if let Some(raw) = self.cache.get(key) {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "discarding unreadable cache entry"),
            }
        }

        debug!(key, "cache miss");
        let value = load()?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                self.cache.set(key, raw);
            }
            Err(e) => warn!(key, error = %e, "could not cache result"),
        }
        Ok(value)
    }
}
