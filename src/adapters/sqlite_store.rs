//! SQLite index store.

use crate::domain::build_guard::{LeaseId, ranges_conflict};
use crate::domain::dates::DATE_FORMAT;
use crate::domain::error::IndexError;
use crate::domain::observation::{DailyObservation, Stock};
use crate::domain::records::{
    ChangeDetail, ChangeKind, CompositionChangeEvent, CompositionDetail, CompositionEntry,
    PerformanceRecord,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::IndexStore;
use chrono::{NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stocks (
    ticker TEXT PRIMARY KEY,
    name TEXT,
    sector TEXT,
    exchange TEXT
);
CREATE TABLE IF NOT EXISTS daily_data (
    date TEXT NOT NULL,
    ticker TEXT NOT NULL REFERENCES stocks(ticker),
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL,
    volume INTEGER NOT NULL,
    market_cap REAL,
    PRIMARY KEY (date, ticker)
);
CREATE TABLE IF NOT EXISTS index_composition (
    date TEXT NOT NULL,
    ticker TEXT NOT NULL REFERENCES stocks(ticker),
    weight REAL NOT NULL CHECK (weight > 0 AND weight <= 1),
    PRIMARY KEY (date, ticker)
);
CREATE TABLE IF NOT EXISTS index_performance (
    date TEXT PRIMARY KEY,
    daily_return REAL NOT NULL,
    cumulative_return REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS composition_changes (
    date TEXT NOT NULL,
    ticker TEXT NOT NULL REFERENCES stocks(ticker),
    event TEXT NOT NULL CHECK (event IN ('ENTRY', 'EXIT')),
    PRIMARY KEY (date, ticker)
);
CREATE TABLE IF NOT EXISTS build_leases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    acquired_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_daily_data_ticker ON daily_data(ticker);
CREATE INDEX IF NOT EXISTS idx_composition_ticker ON index_composition(ticker);";

/// Leases older than this are assumed to belong to a build that died.
pub const DEFAULT_LEASE_TIMEOUT_SECONDS: i64 = 6 * 60 * 60;

pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    lease_timeout_seconds: i64,
}

fn pool_err(e: r2d2::Error) -> IndexError {
    IndexError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> IndexError {
    IndexError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn date_param(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn event_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ChangeKind> {
    let raw: String = row.get(idx)?;
    raw.parse::<ChangeKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn performance_row(row: &Row<'_>) -> rusqlite::Result<PerformanceRecord> {
    Ok(PerformanceRecord {
        date: date_column(row, 0)?,
        daily_return: row.get(1)?,
        cumulative_return: row.get(2)?,
    })
}

impl SqliteStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, IndexError> {
        let db_path = config.require("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        let lease_timeout_seconds = config
            .get_int("sqlite", "lease_timeout_seconds", DEFAULT_LEASE_TIMEOUT_SECONDS)
            .max(1);

        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        debug!(path = %db_path, pool_size, "opened sqlite store");
        Ok(Self {
            pool,
            lease_timeout_seconds,
        })
    }

    pub fn in_memory() -> Result<Self, IndexError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self {
            pool,
            lease_timeout_seconds: DEFAULT_LEASE_TIMEOUT_SECONDS,
        })
    }

    pub fn initialize_schema(&self) -> Result<(), IndexError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, IndexError> {
        self.pool.get().map_err(pool_err)
    }

    fn collect_rows<T, F>(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
        map: F,
    ) -> Result<Vec<T>, IndexError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_err)?;
        let rows = stmt.query_map(args, map).map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(query_err)?);
        }
        Ok(out)
    }

    fn optional_date(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Option<NaiveDate>, IndexError> {
        let raw: Option<String> = self
            .conn()?
            .query_row(sql, args, |row| row.get(0))
            .map_err(query_err)?;
        raw.map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| IndexError::Database {
                reason: e.to_string(),
            })
        })
        .transpose()
    }
}

impl IndexStore for SqliteStore {
    fn get_observations(&self, date: NaiveDate) -> Result<Vec<DailyObservation>, IndexError> {
        self.collect_rows(
            "SELECT date, ticker, open, high, low, close, volume, market_cap
             FROM daily_data WHERE date = ?1 ORDER BY ticker",
            &[&date_param(date)],
            |row| {
                Ok(DailyObservation {
                    date: date_column(row, 0)?,
                    ticker: row.get(1)?,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                    market_cap: row.get(7)?,
                })
            },
        )
    }

    fn trading_dates(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, IndexError> {
        self.collect_rows(
            "SELECT DISTINCT date FROM daily_data WHERE date >= ?1 AND date <= ?2 ORDER BY date",
            &[&date_param(start), &date_param(end)],
            |row| date_column(row, 0),
        )
    }

    fn previous_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>, IndexError> {
        self.optional_date(
            "SELECT MAX(date) FROM daily_data WHERE date < ?1",
            &[&date_param(date)],
        )
    }

    fn last_trading_date(&self) -> Result<Option<NaiveDate>, IndexError> {
        self.optional_date("SELECT MAX(date) FROM daily_data", &[])
    }

    fn get_composition(&self, date: NaiveDate) -> Result<Option<Vec<(String, f64)>>, IndexError> {
        let rows = self.collect_rows(
            "SELECT ticker, weight FROM index_composition WHERE date = ?1 ORDER BY ticker",
            &[&date_param(date)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(if rows.is_empty() { None } else { Some(rows) })
    }

    fn has_composition_before(&self, date: NaiveDate) -> Result<bool, IndexError> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM index_composition WHERE date < ?1)",
                params![date_param(date)],
                |row| row.get(0),
            )
            .map_err(query_err)
    }

    fn put_composition(
        &self,
        date: NaiveDate,
        entries: &[CompositionEntry],
    ) -> Result<(), IndexError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let day = date_param(date);

        tx.execute("DELETE FROM index_composition WHERE date = ?1", params![day])
            .map_err(query_err)?;
        for entry in entries {
            tx.execute(
                "INSERT INTO index_composition (date, ticker, weight) VALUES (?1, ?2, ?3)",
                params![day, entry.ticker, entry.weight],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn put_change_events(
        &self,
        date: NaiveDate,
        events: &[CompositionChangeEvent],
    ) -> Result<(), IndexError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let day = date_param(date);

        tx.execute("DELETE FROM composition_changes WHERE date = ?1", params![day])
            .map_err(query_err)?;
        for event in events {
            tx.execute(
                "INSERT OR REPLACE INTO composition_changes (date, ticker, event)
                 VALUES (?1, ?2, ?3)",
                params![day, event.ticker, event.event.as_str()],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn put_performance(
        &self,
        date: NaiveDate,
        record: &PerformanceRecord,
    ) -> Result<(), IndexError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO index_performance (date, daily_return, cumulative_return)
                 VALUES (?1, ?2, ?3)",
                params![date_param(date), record.daily_return, record.cumulative_return],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn get_performance(&self, date: NaiveDate) -> Result<Option<PerformanceRecord>, IndexError> {
        self.conn()?
            .query_row(
                "SELECT date, daily_return, cumulative_return
                 FROM index_performance WHERE date = ?1",
                params![date_param(date)],
                performance_row,
            )
            .optional()
            .map_err(query_err)
    }

    fn clear_performance(&self, date: NaiveDate) -> Result<(), IndexError> {
        self.conn()?
            .execute(
                "DELETE FROM index_performance WHERE date = ?1",
                params![date_param(date)],
            )
            .map_err(query_err)?;
        Ok(())
    }

    fn latest_performance_before(
        &self,
        date: NaiveDate,
    ) -> Result<Option<PerformanceRecord>, IndexError> {
        self.conn()?
            .query_row(
                "SELECT date, daily_return, cumulative_return
                 FROM index_performance WHERE date < ?1
                 ORDER BY date DESC LIMIT 1",
                params![date_param(date)],
                performance_row,
            )
            .optional()
            .map_err(query_err)
    }

    fn performance_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PerformanceRecord>, IndexError> {
        self.collect_rows(
            "SELECT date, daily_return, cumulative_return
             FROM index_performance WHERE date >= ?1 AND date <= ?2 ORDER BY date",
            &[&date_param(start), &date_param(end)],
            performance_row,
        )
    }

    fn composition_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompositionEntry>, IndexError> {
        self.collect_rows(
            "SELECT date, ticker, weight FROM index_composition
             WHERE date >= ?1 AND date <= ?2 ORDER BY date, ticker",
            &[&date_param(start), &date_param(end)],
            |row| {
                Ok(CompositionEntry {
                    date: date_column(row, 0)?,
                    ticker: row.get(1)?,
                    weight: row.get(2)?,
                })
            },
        )
    }

    fn composition_detail(&self, date: NaiveDate) -> Result<Vec<CompositionDetail>, IndexError> {
        self.collect_rows(
            "SELECT ic.ticker, s.name, s.sector, ic.weight, d.close, d.market_cap
             FROM index_composition ic
             LEFT JOIN stocks s ON s.ticker = ic.ticker
             LEFT JOIN daily_data d ON d.ticker = ic.ticker AND d.date = ic.date
             WHERE ic.date = ?1
             ORDER BY d.market_cap IS NULL, d.market_cap DESC, ic.ticker",
            &[&date_param(date)],
            |row| {
                Ok(CompositionDetail {
                    ticker: row.get(0)?,
                    name: row.get(1)?,
                    sector: row.get(2)?,
                    weight: row.get(3)?,
                    close: row.get(4)?,
                    market_cap: row.get(5)?,
                })
            },
        )
    }

    fn changes_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ChangeDetail>, IndexError> {
        self.collect_rows(
            "SELECT c.date, c.ticker, s.name, s.sector, c.event
             FROM composition_changes c
             LEFT JOIN stocks s ON s.ticker = c.ticker
             WHERE c.date >= ?1 AND c.date <= ?2
             ORDER BY c.date, CASE c.event WHEN 'EXIT' THEN 0 ELSE 1 END, c.ticker",
            &[&date_param(start), &date_param(end)],
            |row| {
                Ok(ChangeDetail {
                    date: date_column(row, 0)?,
                    ticker: row.get(1)?,
                    name: row.get(2)?,
                    sector: row.get(3)?,
                    event: event_column(row, 4)?,
                })
            },
        )
    }

    fn upsert_stocks(&self, stocks: &[Stock]) -> Result<(), IndexError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for stock in stocks {
            tx.execute(
                "INSERT INTO stocks (ticker, name, sector, exchange) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(ticker) DO UPDATE SET
                     name = excluded.name,
                     sector = excluded.sector,
                     exchange = excluded.exchange",
                params![stock.ticker, stock.name, stock.sector, stock.exchange],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn upsert_observations(&self, observations: &[DailyObservation]) -> Result<(), IndexError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for obs in observations {
            tx.execute(
                "INSERT OR IGNORE INTO stocks (ticker) VALUES (?1)",
                params![obs.ticker],
            )
            .map_err(query_err)?;
            tx.execute(
                "INSERT OR REPLACE INTO daily_data
                     (date, ticker, open, high, low, close, volume, market_cap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    date_param(obs.date),
                    obs.ticker,
                    obs.open,
                    obs.high,
                    obs.low,
                    obs.close,
                    obs.volume,
                    obs.market_cap
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    fn acquire_build_lease(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<LeaseId, IndexError> {
        let mut conn = self.conn()?;
        // IMMEDIATE takes the write lock up front so check-then-insert is atomic
        // across processes.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;
        let now = Utc::now().timestamp();

        let expired = tx
            .execute(
                "DELETE FROM build_leases WHERE acquired_at < ?1",
                params![now - self.lease_timeout_seconds],
            )
            .map_err(query_err)?;
        if expired > 0 {
            warn!(expired, "dropped stale build leases");
        }

        let held: Vec<(NaiveDate, NaiveDate)> = {
            let mut stmt = tx
                .prepare("SELECT start_date, end_date FROM build_leases")
                .map_err(query_err)?;
            let rows = stmt
                .query_map([], |row| Ok((date_column(row, 0)?, date_column(row, 1)?)))
                .map_err(query_err)?;
            rows.collect::<rusqlite::Result<_>>().map_err(query_err)?
        };
        if held.iter().any(|&range| ranges_conflict(range, (start, end))) {
            return Err(IndexError::ConcurrentBuildConflict { start, end });
        }

        tx.execute(
            "INSERT INTO build_leases (start_date, end_date, acquired_at) VALUES (?1, ?2, ?3)",
            params![date_param(start), date_param(end), now],
        )
        .map_err(query_err)?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(query_err)?;
        Ok(id)
    }

    fn release_build_lease(&self, lease: LeaseId) -> Result<(), IndexError> {
        self.conn()?
            .execute("DELETE FROM build_leases WHERE id = ?1", params![lease])
            .map_err(query_err)?;
        Ok(())
    }
}
