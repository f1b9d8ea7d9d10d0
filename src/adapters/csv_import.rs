//! CSV ingestion of reference data and daily observations.
//!
//! `stocks.csv` columns: `ticker,name,sector,exchange`.
//! Observation columns: `date,ticker,open,high,low,close,volume,market_cap`.
//! Empty `close` and `market_cap` cells load as missing values.

use crate::domain::error::IndexError;
use crate::domain::observation::{DailyObservation, Stock};
use crate::ports::store_port::IndexStore;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct StockRow {
    ticker: String,
    name: Option<String>,
    sector: Option<String>,
    exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationRow {
    date: NaiveDate,
    ticker: String,
    open: f64,
    high: f64,
    low: f64,
    close: Option<f64>,
    volume: i64,
    market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportSummary {
    pub stocks: usize,
    pub observations: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub struct CsvImporter;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn import_err(source: &str, e: impl std::fmt::Display) -> IndexError {
    IndexError::Import {
        reason: format!("{source}: {e}"),
    }
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

impl CsvImporter {
    pub fn parse_stocks<R: Read>(input: R, source: &str) -> Result<Vec<Stock>, IndexError> {
        let mut stocks = Vec::new();
        for result in reader(input).deserialize::<StockRow>() {
            let row = result.map_err(|e| import_err(source, e))?;
            if row.ticker.is_empty() {
                return Err(import_err(source, "empty ticker"));
            }
            stocks.push(Stock {
                ticker: row.ticker,
                name: non_empty(row.name),
                sector: non_empty(row.sector),
                exchange: non_empty(row.exchange),
            });
        }
        Ok(stocks)
    }

    pub fn parse_observations<R: Read>(
        input: R,
        source: &str,
    ) -> Result<Vec<DailyObservation>, IndexError> {
        let mut observations = Vec::new();
        for result in reader(input).deserialize::<ObservationRow>() {
            let row = result.map_err(|e| import_err(source, e))?;
            if row.ticker.is_empty() {
                return Err(import_err(source, format!("empty ticker on {}", row.date)));
            }
            observations.push(DailyObservation {
                date: row.date,
                ticker: row.ticker,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                market_cap: row.market_cap,
            });
        }
        observations.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.ticker.cmp(&b.ticker)));
        Ok(observations)
    }

    pub fn read_stocks(path: &Path) -> Result<Vec<Stock>, IndexError> {
        let file = std::fs::File::open(path)
            .map_err(|e| import_err(&path.display().to_string(), e))?;
        Self::parse_stocks(file, &path.display().to_string())
    }

    pub fn read_observations(path: &Path) -> Result<Vec<DailyObservation>, IndexError> {
        let file = std::fs::File::open(path)
            .map_err(|e| import_err(&path.display().to_string(), e))?;
        Self::parse_observations(file, &path.display().to_string())
    }

    /// Load reference data first so observation rows attach to named stocks.
    pub fn import(
        store: &dyn IndexStore,
        stocks_path: Option<&Path>,
        observations_path: &Path,
    ) -> Result<ImportSummary, IndexError> {
        let mut summary = ImportSummary::default();

        if let Some(path) = stocks_path {
            let stocks = Self::read_stocks(path)?;
            store.upsert_stocks(&stocks)?;
            summary.stocks = stocks.len();
        }

        let observations = Self::read_observations(observations_path)?;
        store.upsert_observations(&observations)?;

        let dates: BTreeSet<NaiveDate> = observations.iter().map(|o| o.date).collect();
        summary.observations = observations.len();
        summary.first_date = dates.first().copied();
        summary.last_date = dates.last().copied();

        info!(
            stocks = summary.stocks,
            observations = summary.observations,
            trading_days = dates.len(),
            "import complete"
        );
        Ok(summary)
    }
}
