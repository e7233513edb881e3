//! `SQLite` schema definitions for transitrack.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the locations table.
///
/// Append-only: rows are never updated, duplicates are allowed.
pub const CREATE_LOCATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    route_id TEXT,
    bus_number TEXT,
    recorded_at TEXT NOT NULL
)
";

/// SQL statement to create an index for latest-by-entity lookups.
pub const CREATE_ENTITY_RECORDED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_locations_entity_recorded
ON locations(entity_id, recorded_at DESC)
";

/// SQL statement to create the stops table.
pub const CREATE_STOPS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS stops (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_LOCATIONS_TABLE,
    CREATE_ENTITY_RECORDED_INDEX,
    CREATE_STOPS_TABLE,
    CREATE_METADATA_TABLE,
];
