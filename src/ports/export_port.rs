//! Export port for the derived index records.

use crate::domain::error::IndexError;
use crate::domain::records::{ChangeDetail, CompositionEntry, PerformanceRecord};
use crate::ports::store_port::IndexStore;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Everything an export needs, read from storage only.
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub performance: Vec<PerformanceRecord>,
    pub compositions: Vec<CompositionEntry>,
    pub changes: Vec<ChangeDetail>,
}

impl ExportBundle {
    pub fn load(
        store: &dyn IndexStore,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, IndexError> {
        Ok(Self {
            performance: store.performance_range(start, end)?,
            compositions: store.composition_range(start, end)?,
            changes: store.changes_range(start, end)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.performance.is_empty() && self.compositions.is_empty() && self.changes.is_empty()
    }
}

pub trait ExportPort {
    /// Write the bundle under `output_dir`; returns the files written.
    fn write(&self, bundle: &ExportBundle, output_dir: &Path) -> Result<Vec<PathBuf>, IndexError>;
}
