//! Error types for transitrack.
//!
//! This module defines all error types used throughout the transitrack
//! crate, providing detailed context for debugging and user-friendly
//! error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for transitrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Request Errors ===
    /// A submitted report or query failed validation.
    ///
    /// Reported to the caller; never retried.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the validation failure.
        message: String,
    },

    /// No location has been recorded for the requested entity.
    ///
    /// Not an error state; maps to a 404-class response.
    #[error("no location found for entity '{entity_id}'")]
    NotFound {
        /// The entity that was queried.
        entity_id: String,
    },

    /// The stop index contains no stops.
    ///
    /// A deployment-level configuration problem, not a per-request one.
    #[error("stop index is empty: no stops configured")]
    EmptyIndex,

    /// The account directory rejected the supplied credentials.
    #[error("credentials rejected by account directory")]
    Unauthorized,

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A durable read or write failed; the caller may retry the whole
    /// submission, no partial persistence occurs.
    #[error("storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system or network operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for transitrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new invalid-input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given entity.
    #[must_use]
    pub fn not_found(entity_id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_id: entity_id.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Check if this error means the record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error indicates durable storage is unavailable.
    ///
    /// Such failures are transient; the caller may retry the whole
    /// submission.
    #[must_use]
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::DatabaseOpen { .. })
    }
}
