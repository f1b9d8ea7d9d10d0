//! Derived index records: composition, performance and change events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionEntry {
    pub date: NaiveDate,
    pub ticker: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub date: NaiveDate,
    pub daily_return: f64,
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Exit,
    Entry,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Entry => "ENTRY",
            ChangeKind::Exit => "EXIT",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ENTRY" => Ok(ChangeKind::Entry),
            "EXIT" => Ok(ChangeKind::Exit),
            other => Err(format!("unknown change event '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionChangeEvent {
    pub date: NaiveDate,
    pub ticker: String,
    pub event: ChangeKind,
}

/// A composition row joined with stock metadata and that day's observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionDetail {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub weight: f64,
    pub close: Option<f64>,
    pub market_cap: Option<f64>,
}

/// A change event joined with stock metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetail {
    pub date: NaiveDate,
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub event: ChangeKind,
}
