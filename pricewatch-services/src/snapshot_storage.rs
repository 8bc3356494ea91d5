//! Snapshot Storage Service
//!
//! SQLite-based storage for price snapshots and the tracked ticker registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pricewatch_core::{
    Aggregate, AggregateView, BatchFailure, PriceSnapshot, PricewatchError, PricewatchResult,
    SnapshotStore,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, warn};

/// Snapshot storage using SQLite
///
/// The `tickers` table is the tracked set. Every snapshot insert registers
/// its ticker in the same transaction, so a ticker with history is always
/// tracked.
pub struct SnapshotStorage {
    conn: Mutex<Connection>,
}

/// Raw snapshot row as read from SQLite
type SnapshotRow = (Option<String>, String, f64, i64);

impl SnapshotStorage {
    /// Create a new SnapshotStorage instance
    ///
    /// Creates the database file and tables if they don't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, SnapshotStorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SnapshotStorageError::Io(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Create an in-memory SnapshotStorage (useful for testing)
    pub fn new_in_memory() -> Result<Self, SnapshotStorageError> {
        let conn = Connection::open_in_memory()?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;

        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), SnapshotStorageError> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickers (
                short_title TEXT PRIMARY KEY COLLATE NOCASE,
                registered_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                short_title TEXT NOT NULL COLLATE NOCASE,
                cost REAL NOT NULL CHECK (cost >= 0),
                observed_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_ticker
            ON snapshots(short_title, observed_at);
            "#,
        )?;

        Ok(())
    }

    /// All tracked tickers, ordered by symbol
    pub fn tracked_tickers(&self) -> Result<Vec<String>, SnapshotStorageError> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare("SELECT short_title FROM tickers ORDER BY short_title")?;
        let tickers = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tickers)
    }

    /// Register a ticker. Returns `true` if it was not tracked yet.
    pub fn register_ticker(&self, ticker: &str) -> Result<bool, SnapshotStorageError> {
        let conn = self.conn.lock();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tickers (short_title, registered_at) VALUES (?1, ?2)",
            params![ticker, Utc::now().timestamp_millis()],
        )?;

        Ok(inserted > 0)
    }

    /// Store a single snapshot together with its ticker registration
    pub fn store_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), SnapshotStorageError> {
        let mut conn = self.conn.lock();
        Self::insert_snapshot(&mut conn, snapshot)
    }

    /// Store snapshots one row at a time.
    ///
    /// Each row commits on its own; the failures are returned per ticker and
    /// do not undo the rows that went in.
    pub fn store_snapshots(&self, snapshots: &[PriceSnapshot]) -> (usize, BatchFailure) {
        let mut conn = self.conn.lock();

        let mut stored = 0;
        let mut failures = BatchFailure::new();
        for snapshot in snapshots {
            match Self::insert_snapshot(&mut conn, snapshot) {
                Ok(()) => stored += 1,
                Err(e) => {
                    warn!("Failed to store snapshot for {}: {}", snapshot.short_title, e);
                    failures.push(snapshot.short_title.clone(), e.into());
                }
            }
        }

        (stored, failures)
    }

    fn insert_snapshot(
        conn: &mut Connection,
        snapshot: &PriceSnapshot,
    ) -> Result<(), SnapshotStorageError> {
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO tickers (short_title, registered_at) VALUES (?1, ?2)",
            params![snapshot.short_title, Utc::now().timestamp_millis()],
        )?;

        tx.execute(
            r#"
            INSERT INTO snapshots (title, short_title, cost, observed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                snapshot.title,
                snapshot.short_title,
                snapshot.cost,
                snapshot.observed_at.timestamp_millis(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get the latest snapshot for a ticker
    pub fn get_latest_snapshot(
        &self,
        ticker: &str,
    ) -> Result<Option<PriceSnapshot>, SnapshotStorageError> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            r#"
            SELECT title, short_title, cost, observed_at
            FROM snapshots
            WHERE short_title = ?1
            ORDER BY observed_at DESC, id DESC
            LIMIT 1
            "#,
        )?;

        let row: Option<SnapshotRow> = stmt
            .query_row(params![ticker], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .optional()?;

        let Some((title, short_title, cost, observed_at)) = row else {
            return Ok(None);
        };

        Ok(Some(PriceSnapshot {
            title,
            short_title,
            cost,
            observed_at: from_millis(observed_at)?,
        }))
    }

    /// Get the number of snapshots stored for a ticker
    pub fn get_snapshot_count(&self, ticker: &str) -> Result<usize, SnapshotStorageError> {
        let conn = self.conn.lock();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE short_title = ?1",
            params![ticker],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Reduce the full history of each requested ticker.
    ///
    /// Results come back ordered by ticker, one row per ticker that has at
    /// least one snapshot.
    pub fn aggregate(
        &self,
        aggregate: Aggregate,
        tickers: &[String],
    ) -> Result<Vec<AggregateView>, SnapshotStorageError> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=tickers.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = match aggregate {
            Aggregate::Last => format!(
                r#"
                SELECT k.short_title, s.title, s.cost, s.observed_at,
                       (SELECT COUNT(*) FROM snapshots c WHERE c.short_title = k.short_title)
                FROM tickers k
                JOIN snapshots s ON s.id = (
                    SELECT l.id FROM snapshots l
                    WHERE l.short_title = k.short_title
                    ORDER BY l.observed_at DESC, l.id DESC
                    LIMIT 1
                )
                WHERE k.short_title IN ({})
                ORDER BY k.short_title
                "#,
                placeholders
            ),
            Aggregate::Average | Aggregate::Min | Aggregate::Max => {
                let reduction = match aggregate {
                    Aggregate::Average => "AVG(s.cost)",
                    Aggregate::Min => "MIN(s.cost)",
                    _ => "MAX(s.cost)",
                };
                format!(
                    r#"
                    SELECT k.short_title,
                           (SELECT t.title FROM snapshots t
                            WHERE t.short_title = k.short_title AND t.title IS NOT NULL
                            ORDER BY t.observed_at DESC, t.id DESC
                            LIMIT 1),
                           {}, MAX(s.observed_at), COUNT(s.id)
                    FROM tickers k
                    JOIN snapshots s ON s.short_title = k.short_title
                    WHERE k.short_title IN ({})
                    GROUP BY k.short_title
                    ORDER BY k.short_title
                    "#,
                    reduction, placeholders
                )
            }
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt
            .query_map(params_from_iter(tickers.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("{} aggregate over {} tickers returned {} rows", aggregate, tickers.len(), rows.len());

        let mut views = Vec::with_capacity(rows.len());
        for (short_title, title, value, observed_at, samples) in rows {
            views.push(AggregateView {
                short_title,
                title,
                aggregate,
                value,
                samples: samples as u64,
                observed_at: from_millis(observed_at)?,
            });
        }

        Ok(views)
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, SnapshotStorageError> {
    DateTime::from_timestamp_millis(millis).ok_or(SnapshotStorageError::InvalidTimestamp(millis))
}

#[async_trait]
impl SnapshotStore for SnapshotStorage {
    async fn list_tracked_tickers(&self) -> PricewatchResult<Vec<String>> {
        Ok(self.tracked_tickers()?)
    }

    async fn write_snapshots(&self, snapshots: &[PriceSnapshot]) -> PricewatchResult<()> {
        let (stored, failures) = self.store_snapshots(snapshots);
        debug!("Stored {}/{} snapshots", stored, snapshots.len());
        failures.into_result()
    }

    async fn query_aggregate(
        &self,
        aggregate: Aggregate,
        tickers: &[String],
    ) -> PricewatchResult<Vec<AggregateView>> {
        Ok(self.aggregate(aggregate, tickers)?)
    }

    async fn query_single_last(&self, ticker: &str) -> PricewatchResult<PriceSnapshot> {
        self.get_latest_snapshot(ticker)?
            .ok_or_else(|| PricewatchError::not_found(format!("no snapshot for ticker {}", ticker)))
    }

    async fn register_or_noop(&self, ticker: &str) -> PricewatchResult<bool> {
        if ticker.trim().is_empty() {
            return Err(PricewatchError::invalid_param("ticker must not be empty"));
        }
        Ok(self.register_ticker(ticker)?)
    }
}

/// Errors that can occur during snapshot storage operations
#[derive(Debug, thiserror::Error)]
pub enum SnapshotStorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid stored timestamp: {0}")]
    InvalidTimestamp(i64),
}

impl From<SnapshotStorageError> for PricewatchError {
    fn from(err: SnapshotStorageError) -> Self {
        PricewatchError::database(err.to_string())
    }
}
