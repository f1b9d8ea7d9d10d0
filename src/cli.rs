//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::csv_export::CsvExportAdapter;
use crate::adapters::csv_import::CsvImporter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_cache::MemoryCache;
use crate::adapters::memory_store::MemoryStore;
use crate::domain::builder::{BuildReport, IndexBuilder};
use crate::domain::config_validation::{CacheConfig, IndexConfig, validate_all};
use crate::domain::dates::{normalize_range, parse_date};
use crate::domain::error::IndexError;
use crate::domain::format::{format_market_cap, format_number, format_percentage};
use crate::domain::query::IndexQueries;
use crate::domain::records::{ChangeDetail, CompositionDetail, PerformanceRecord};
use crate::logging;
use crate::ports::cache_port::{CachePort, NoopCache};
use crate::ports::config_port::ConfigPort;
use crate::ports::export_port::{ExportBundle, ExportPort};
use crate::ports::store_port::IndexStore;

#[derive(Parser, Debug)]
#[command(name = "eqindex", about = "Equal-weighted top-N market-cap index builder")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load stock reference data and daily observations from CSV
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        observations: PathBuf,
        #[arg(long)]
        stocks: Option<PathBuf>,
    },
    /// Build the index over a date range
    Build {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        /// Build against an in-process copy of the observations; nothing is written
        #[arg(long)]
        in_memory: bool,
    },
    /// Show daily and cumulative returns
    Performance {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
    },
    /// Show the index members on a date
    Composition {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        date: String,
    },
    /// Show entries and exits over a date range
    Changes {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
    },
    /// Write performance, compositions and changes as CSV files
    Export {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    pub fn config_path(&self) -> &Path {
        match self {
            Command::Import { config, .. }
            | Command::Build { config, .. }
            | Command::Performance { config, .. }
            | Command::Composition { config, .. }
            | Command::Changes { config, .. }
            | Command::Export { config, .. }
            | Command::Validate { config } => config,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.command.config_path()) {
        Ok(c) => c,
        Err(code) => return code,
    };
    logging::init(config.get_string("log", "level").as_deref());

    if let Err(e) = validate_all(&config) {
        return fail(&e);
    }

    let result = match cli.command {
        Command::Import {
            observations,
            stocks,
            ..
        } => run_import(&config, &observations, stocks.as_deref()),
        Command::Build {
            start,
            end,
            in_memory,
            ..
        } => run_build(&config, &start, end.as_deref(), in_memory),
        Command::Performance { start, end, .. } => {
            run_performance(&config, &start, end.as_deref())
        }
        Command::Composition { date, .. } => run_composition(&config, &date),
        Command::Changes { start, end, .. } => run_changes(&config, &start, end.as_deref()),
        Command::Export {
            start, end, output, ..
        } => run_export(&config, &start, end.as_deref(), &output),
        Command::Validate { .. } => run_validate(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => fail(&e),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn fail(err: &IndexError) -> ExitCode {
    eprintln!("error: {err}");
    if err.is_retryable() {
        eprintln!("hint: this failure is transient; re-running the same command may succeed");
    }
    ExitCode::from(err)
}

#[cfg(feature = "sqlite")]
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn IndexStore>, IndexError> {
    use crate::adapters::sqlite_store::SqliteStore;

    let store = SqliteStore::from_config(config)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
pub fn open_store(_config: &dyn ConfigPort) -> Result<Box<dyn IndexStore>, IndexError> {
    Err(IndexError::ConfigInvalid {
        section: "sqlite".into(),
        key: "path".into(),
        reason: "sqlite feature is required for persistent storage".into(),
    })
}

/// Query cache for one command. It lives in this process only, so each
/// invocation starts empty and a build needs no invalidation here.
pub fn open_cache(config: &CacheConfig) -> Box<dyn CachePort> {
    if config.enabled {
        Box::new(MemoryCache::new(Duration::from_secs(config.ttl_seconds)))
    } else {
        Box::new(NoopCache)
    }
}

/// Parse `start`, and `end` if given, else use the last stored trading date.
pub fn resolve_range(
    store: &dyn IndexStore,
    start: &str,
    end: Option<&str>,
) -> Result<(NaiveDate, NaiveDate), IndexError> {
    let start = parse_date(start)?;
    let end = match end {
        Some(raw) => parse_date(raw)?,
        None => store
            .last_trading_date()?
            .ok_or_else(|| IndexError::InvalidDateRange {
                reason: "no end date given and no observations are stored".into(),
            })?,
    };
    Ok(normalize_range(start, end))
}

/// Status line for a build over a range that already has stored results.
pub fn rebuild_notice(
    store: &dyn IndexStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Option<String>, IndexError> {
    Ok(store.index_exists_for_range(start, end)?.then(|| {
        format!("Rebuilding {start} to {end}: stored results in range will be overwritten")
    }))
}

/// Copy the observations of `[start, end]` into a fresh in-process store.
pub fn dry_run_store(
    source: &dyn IndexStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<MemoryStore, IndexError> {
    let target = MemoryStore::new();
    for date in source.trading_dates(start, end)? {
        target.upsert_observations(&source.get_observations(date)?)?;
    }
    Ok(target)
}

fn run_import(
    config: &dyn ConfigPort,
    observations: &Path,
    stocks: Option<&Path>,
) -> Result<ExitCode, IndexError> {
    let store = open_store(config)?;
    let summary = CsvImporter::import(store.as_ref(), stocks, observations)?;

    println!(
        "Imported {} stocks and {} observations",
        summary.stocks, summary.observations
    );
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        println!("Observation dates: {first} to {last}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_build(
    config: &dyn ConfigPort,
    start: &str,
    end: Option<&str>,
    in_memory: bool,
) -> Result<ExitCode, IndexError> {
    let index_config = IndexConfig::from_config(config)?;
    let store = open_store(config)?;
    let (start, end) = resolve_range(store.as_ref(), start, end)?;

    let report = if in_memory {
        info!(%start, %end, "dry run against an in-memory copy");
        let scratch = dry_run_store(store.as_ref(), start, end)?;
        IndexBuilder::new(&scratch, index_config).build_range(start, end)?
    } else {
        if let Some(notice) = rebuild_notice(store.as_ref(), start, end)? {
            println!("{notice}");
        }
        IndexBuilder::new(store.as_ref(), index_config).build_range(start, end)?
    };

    print!("{}", format_report(&report));
    match &report.failed {
        Some(failed) => Ok(fail(&failed.error)),
        None => Ok(ExitCode::SUCCESS),
    }
}

fn run_performance(
    config: &dyn ConfigPort,
    start: &str,
    end: Option<&str>,
) -> Result<ExitCode, IndexError> {
    let cache = open_cache(&CacheConfig::from_config(config)?);
    let store = open_store(config)?;
    let (start, end) = resolve_range(store.as_ref(), start, end)?;

    let records = IndexQueries::new(store.as_ref(), cache.as_ref()).performance(start, end)?;
    if records.is_empty() {
        warn!(%start, %end, "no performance records in range");
    }
    print!("{}", format_performance_table(&records));
    Ok(ExitCode::SUCCESS)
}

fn run_composition(config: &dyn ConfigPort, date: &str) -> Result<ExitCode, IndexError> {
    let cache = open_cache(&CacheConfig::from_config(config)?);
    let store = open_store(config)?;
    let date = parse_date(date)?;

    let members = IndexQueries::new(store.as_ref(), cache.as_ref()).composition(date)?;
    if members.is_empty() {
        eprintln!("No composition stored for {date}");
        return Ok(ExitCode::SUCCESS);
    }
    print!("{}", format_composition_table(&members));
    Ok(ExitCode::SUCCESS)
}

fn run_changes(
    config: &dyn ConfigPort,
    start: &str,
    end: Option<&str>,
) -> Result<ExitCode, IndexError> {
    let cache = open_cache(&CacheConfig::from_config(config)?);
    let store = open_store(config)?;
    let (start, end) = resolve_range(store.as_ref(), start, end)?;

    let changes = IndexQueries::new(store.as_ref(), cache.as_ref()).changes(start, end)?;
    print!("{}", format_changes_table(&changes));
    Ok(ExitCode::SUCCESS)
}

fn run_export(
    config: &dyn ConfigPort,
    start: &str,
    end: Option<&str>,
    output: &Path,
) -> Result<ExitCode, IndexError> {
    let store = open_store(config)?;
    let (start, end) = resolve_range(store.as_ref(), start, end)?;

    let bundle = ExportBundle::load(store.as_ref(), start, end)?;
    if bundle.is_empty() {
        warn!(%start, %end, "nothing built in range, writing empty export");
    }
    for path in CsvExportAdapter.write(&bundle, output)? {
        println!("{}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config: &dyn ConfigPort) -> Result<ExitCode, IndexError> {
    let index = IndexConfig::from_config(config)?;
    let cache = CacheConfig::from_config(config)?;

    println!("index size:             {}", index.index_size);
    println!("emit inception entries: {}", index.emit_inception_entries);
    println!("missing close policy:   {}", index.missing_close_policy);
    println!(
        "cache:                  {}",
        if cache.enabled {
            format!("enabled, ttl {}s", cache.ttl_seconds)
        } else {
            "disabled".to_string()
        }
    );
    match config.get_string("sqlite", "path") {
        Some(path) => println!("sqlite path:            {path}"),
        None => println!("sqlite path:            (not set)"),
    }
    eprintln!("Configuration is valid.");
    Ok(ExitCode::SUCCESS)
}

pub fn format_report(report: &BuildReport) -> String {
    let mut out = format!(
        "Built {} to {}: {} dates, {} skipped, {} performance records, {} change events\n",
        report.start,
        report.end,
        report.trading_days(),
        report.skipped.len(),
        report.performance_records,
        report.change_events,
    );
    for skipped in &report.skipped {
        out.push_str(&format!("  skipped {}: {}\n", skipped.date, skipped.reason));
    }
    if let Some(failed) = &report.failed {
        out.push_str(&format!("  stopped at {}: {}\n", failed.date, failed.error));
    }
    out
}

pub fn format_performance_table(records: &[PerformanceRecord]) -> String {
    let mut out = format!("{:<12} {:>10} {:>12}\n", "Date", "Daily", "Cumulative");
    for r in records {
        out.push_str(&format!(
            "{:<12} {:>10} {:>12}\n",
            r.date.to_string(),
            format_percentage(r.daily_return, 2),
            format_percentage(r.cumulative_return, 2),
        ));
    }
    out
}

pub fn format_composition_table(members: &[CompositionDetail]) -> String {
    let mut out = format!(
        "{:<8} {:<28} {:<22} {:>8} {:>12} {:>14}\n",
        "Ticker", "Name", "Sector", "Weight", "Close", "Market Cap"
    );
    for m in members {
        out.push_str(&format!(
            "{:<8} {:<28} {:<22} {:>8} {:>12} {:>14}\n",
            m.ticker,
            m.name.as_deref().unwrap_or("-"),
            m.sector.as_deref().unwrap_or("-"),
            format_percentage(m.weight, 2),
            m.close.map(|c| format_number(c, 2)).unwrap_or_else(|| "-".into()),
            m.market_cap.map(format_market_cap).unwrap_or_else(|| "-".into()),
        ));
    }
    out
}

pub fn format_changes_table(changes: &[ChangeDetail]) -> String {
    let mut out = format!(
        "{:<12} {:<6} {:<8} {:<28} {}\n",
        "Date", "Event", "Ticker", "Name", "Sector"
    );
    for c in changes {
        out.push_str(&format!(
            "{:<12} {:<6} {:<8} {:<28} {}\n",
            c.date.to_string(),
            c.event.as_str(),
            c.ticker,
            c.name.as_deref().unwrap_or("-"),
            c.sector.as_deref().unwrap_or("-"),
        ));
    }
    out
}
