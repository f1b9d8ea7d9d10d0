//! Mutual exclusion between index builds.
//!
//! A build holds a [`BuildLease`] on its date range for its whole run. Leases
//! live in the store, so every builder of the same index sees them. Ranges
//! that overlap an in-flight build, or sit within [`ADJACENCY_DAYS`] of one,
//! are refused instead of queued.

use crate::domain::error::IndexError;
use crate::ports::store_port::IndexStore;
use chrono::NaiveDate;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Calendar gap below which two ranges are treated as adjacent.
pub const ADJACENCY_DAYS: i64 = 7;

/// Store-assigned handle of an in-flight build.
pub type LeaseId = i64;

/// Whether two inclusive ranges overlap or sit within [`ADJACENCY_DAYS`].
pub fn ranges_conflict(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    let (first, second) = if a.0 <= b.0 { (a, b) } else { (b, a) };
    (second.0 - first.1).num_days() < ADJACENCY_DAYS
}

#[derive(Debug, Default)]
struct Registry {
    next_id: LeaseId,
    active: Vec<(LeaseId, NaiveDate, NaiveDate)>,
}

/// In-process lease table for stores without a shared backing file.
#[derive(Debug, Default)]
pub struct BuildGuard {
    registry: Mutex<Registry>,
}

impl BuildGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, start: NaiveDate, end: NaiveDate) -> Result<LeaseId, IndexError> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if registry
            .active
            .iter()
            .any(|&(_, s, e)| ranges_conflict((s, e), (start, end)))
        {
            return Err(IndexError::ConcurrentBuildConflict { start, end });
        }
        registry.next_id += 1;
        let id = registry.next_id;
        registry.active.push((id, start, end));
        Ok(id)
    }

    pub fn release(&self, id: LeaseId) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.active.retain(|&(held, _, _)| held != id);
    }

    pub fn active_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .len()
    }
}

/// Held for the duration of a build; releases its range on drop.
pub struct BuildLease<'a> {
    store: &'a dyn IndexStore,
    id: LeaseId,
    range: (NaiveDate, NaiveDate),
}

impl<'a> BuildLease<'a> {
    pub fn acquire(
        store: &'a dyn IndexStore,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, IndexError> {
        let id = store.acquire_build_lease(start, end)?;
        debug!(lease = id, %start, %end, "build lease acquired");
        Ok(Self {
            store,
            id,
            range: (start, end),
        })
    }

    pub fn id(&self) -> LeaseId {
        self.id
    }

    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        self.range
    }
}

impl Drop for BuildLease<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release_build_lease(self.id) {
            warn!(lease = self.id, error = %e, "failed to release build lease");
        }
    }
}
