//! Ticker reference data and raw daily observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Static metadata for a listed equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub exchange: Option<String>,
}

impl Stock {
    pub fn bare(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: None,
            sector: None,
            exchange: None,
        }
    }
}

/// One ticker's price, volume and market capitalization for one trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: Option<f64>,
    pub volume: i64,
    pub market_cap: Option<f64>,
}

impl DailyObservation {
    /// Market cap usable for ranking: present and finite.
    pub fn ranking_cap(&self) -> Option<f64> {
        self.market_cap.filter(|cap| cap.is_finite())
    }

    /// Close usable as a return endpoint: present, finite and positive.
    pub fn valid_close(&self) -> Option<f64> {
        self.close.filter(|c| c.is_finite() && *c > 0.0)
    }
}
