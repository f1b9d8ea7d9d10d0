//! CSV export of performance, compositions and change events.

use crate::domain::error::IndexError;
use crate::ports::export_port::{ExportBundle, ExportPort};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const PERFORMANCE_FILE: &str = "performance.csv";
pub const COMPOSITIONS_FILE: &str = "compositions.csv";
pub const CHANGES_FILE: &str = "changes.csv";

pub struct CsvExportAdapter;

fn export_err(path: &Path, e: impl std::fmt::Display) -> IndexError {
    IndexError::Export {
        reason: format!("{}: {e}", path.display()),
    }
}

fn pct(value: f64) -> String {
    format!("{:.4}", value * 100.0)
}

fn write_csv<I>(path: &Path, header: &[&str], rows: I) -> Result<(), IndexError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_path(path).map_err(|e| export_err(path, e))?;
    writer.write_record(header).map_err(|e| export_err(path, e))?;
    for row in rows {
        writer.write_record(&row).map_err(|e| export_err(path, e))?;
    }
    writer.flush().map_err(|e| export_err(path, e))?;
    Ok(())
}

impl ExportPort for CsvExportAdapter {
    fn write(&self, bundle: &ExportBundle, output_dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
        fs::create_dir_all(output_dir).map_err(|e| export_err(output_dir, e))?;

        let performance = output_dir.join(PERFORMANCE_FILE);
        write_csv(
            &performance,
            &["date", "daily_return_pct", "cumulative_return_pct"],
            bundle.performance.iter().map(|r| {
                vec![
                    r.date.to_string(),
                    pct(r.daily_return),
                    pct(r.cumulative_return),
                ]
            }),
        )?;

        let compositions = output_dir.join(COMPOSITIONS_FILE);
        write_csv(
            &compositions,
            &["date", "ticker", "weight_pct"],
            bundle
                .compositions
                .iter()
                .map(|c| vec![c.date.to_string(), c.ticker.clone(), pct(c.weight)]),
        )?;

        let changes = output_dir.join(CHANGES_FILE);
        write_csv(
            &changes,
            &["date", "ticker", "name", "sector", "event"],
            bundle.changes.iter().map(|c| {
                vec![
                    c.date.to_string(),
                    c.ticker.clone(),
                    c.name.clone().unwrap_or_default(),
                    c.sector.clone().unwrap_or_default(),
                    c.event.to_string(),
                ]
            }),
        )?;

        info!(
            dir = %output_dir.display(),
            performance = bundle.performance.len(),
            compositions = bundle.compositions.len(),
            changes = bundle.changes.len(),
            "export written"
        );
        Ok(vec![performance, compositions, changes])
    }
}
