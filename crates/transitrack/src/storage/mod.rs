//! Storage layer for transitrack.
//!
//! This module provides `SQLite`-based persistent storage for location
//! reports and bus stops, including latest-by-entity lookup and basic
//! statistics.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::report::LocationReport;
use crate::stops::StopPoint;

/// Storage engine for location reports and stops.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Append-only report insertion (duplicates allowed, no upsert)
/// - Latest-position lookup per entity
/// - Stop reference data for the nearest-stop index
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        // Initialize schema
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a location report and return the assigned row id.
    ///
    /// The table is append-only: submitting the same report twice
    /// produces two distinct rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_report(&self, report: &LocationReport) -> Result<i64> {
        let recorded_at = report.recorded_at.to_rfc3339();

        self.conn.execute(
            r"
            INSERT INTO locations (entity_id, latitude, longitude, route_id, bus_number, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                report.entity_id,
                report.latitude,
                report.longitude,
                report.route_id,
                report.bus_number,
                recorded_at,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted location report with id {}", id);
        Ok(id)
    }

    /// Get the latest report for an entity.
    ///
    /// Returns the row with the maximum `recorded_at`; equal timestamps
    /// resolve to the most recently inserted row so the result stays
    /// deterministic under concurrent same-instant writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no report exists for the entity, or
    /// a storage error if the query fails.
    pub fn latest(&self, entity_id: &str) -> Result<LocationReport> {
        let result = self
            .conn
            .query_row(
                r"
                SELECT id, entity_id, latitude, longitude, route_id, bus_number, recorded_at
                FROM locations WHERE entity_id = ?1
                ORDER BY recorded_at DESC, id DESC LIMIT 1
                ",
                [entity_id],
                Self::row_to_report,
            )
            .optional()?;

        result.ok_or_else(|| Error::not_found(entity_id))
    }

    /// Get the most recent reports across all entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_reports(&self, limit: usize) -> Result<Vec<LocationReport>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, entity_id, latitude, longitude, route_id, bus_number, recorded_at
            FROM locations ORDER BY recorded_at DESC, id DESC LIMIT ?1
            ",
        )?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let reports = stmt
            .query_map([limit_i64], Self::row_to_report)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(reports)
    }

    /// Count total reports in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_reports(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count distinct tracked entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_entities(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT entity_id) FROM locations",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Insert or replace a stop.
    ///
    /// Stops are read-mostly reference data keyed by their external id,
    /// so re-importing a seed file updates rows in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert_stop(&self, stop: &StopPoint) -> Result<()> {
        self.conn.execute(
            r"
            INSERT OR REPLACE INTO stops (id, name, latitude, longitude)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![stop.id, stop.name, stop.latitude, stop.longitude],
        )?;
        Ok(())
    }

    /// Get all stops, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stops(&self) -> Result<Vec<StopPoint>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, latitude, longitude FROM stops ORDER BY id")?;

        let stops = stmt
            .query_map([], |row| {
                Ok(StopPoint {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stops)
    }

    /// Count stops in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_stops(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stops", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_reports = self.count_reports()?;
        let entity_count = self.count_entities()?;
        let stop_count = self.count_stops()?;

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT recorded_at FROM locations ORDER BY recorded_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let newest_report = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        // Get database file size
        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_reports,
            entity_count,
            stop_count,
            newest_report,
            db_size_bytes,
        })
    }

    /// Convert a database row to a `LocationReport`.
    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<LocationReport> {
        let id: i64 = row.get(0)?;
        let entity_id: String = row.get(1)?;
        let latitude: f64 = row.get(2)?;
        let longitude: f64 = row.get(3)?;
        let route_id: Option<String> = row.get(4)?;
        let bus_number: Option<String> = row.get(5)?;
        let recorded_at_str: String = row.get(6)?;

        let recorded_at = DateTime::parse_from_rfc3339(&recorded_at_str)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

        Ok(LocationReport {
            id: Some(id),
            entity_id,
            latitude,
            longitude,
            route_id,
            bus_number,
            recorded_at,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of location reports stored.
    pub total_reports: i64,
    /// Number of distinct tracked entities.
    pub entity_count: i64,
    /// Number of stops in the index.
    pub stop_count: i64,
    /// Timestamp of the newest report.
    pub newest_report: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
