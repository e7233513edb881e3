//! Core location report types for transitrack.
//!
//! This module defines the fundamental data structures for representing
//! position reports as they travel through the ingest pipeline: the
//! client-supplied input shape, the persisted report, and the event
//! broadcast to live subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum valid latitude in degrees.
pub const LATITUDE_MIN: f64 = -90.0;
/// Maximum valid latitude in degrees.
pub const LATITUDE_MAX: f64 = 90.0;
/// Minimum valid longitude in degrees.
pub const LONGITUDE_MIN: f64 = -180.0;
/// Maximum valid longitude in degrees.
pub const LONGITUDE_MAX: f64 = 180.0;

/// A position report as supplied by a client.
///
/// Deliberately carries no timestamp field: the server always assigns
/// `recorded_at` at persistence time, so clock skew on the reporting
/// device cannot reorder an entity's history. Unknown fields sent by
/// clients (including a timestamp) are dropped during deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    /// Stable identifier of the tracked driver/bus.
    pub entity_id: String,

    /// Latitude in degrees, must be within [-90, 90].
    pub latitude: f64,

    /// Longitude in degrees, must be within [-180, 180].
    pub longitude: f64,

    /// Route the entity is currently serving, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,

    /// Fleet number displayed on the vehicle, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_number: Option<String>,
}

impl ReportInput {
    /// Create a bare input with just an entity id and coordinates.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            latitude,
            longitude,
            route_id: None,
            bus_number: None,
        }
    }

    /// Check whether the coordinates are finite and within range.
    #[must_use]
    pub fn coordinates_in_range(&self) -> bool {
        latitude_in_range(self.latitude) && longitude_in_range(self.longitude)
    }
}

/// Check a latitude value for validity.
#[must_use]
pub fn latitude_in_range(latitude: f64) -> bool {
    latitude.is_finite() && (LATITUDE_MIN..=LATITUDE_MAX).contains(&latitude)
}

/// Check a longitude value for validity.
#[must_use]
pub fn longitude_in_range(longitude: f64) -> bool {
    longitude.is_finite() && (LONGITUDE_MIN..=LONGITUDE_MAX).contains(&longitude)
}

/// A validated, persisted position report.
///
/// Immutable once created; the store is append-only and never
/// overwrites an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    /// Unique identifier assigned by the storage layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Stable identifier of the tracked driver/bus.
    pub entity_id: String,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Route the entity was serving when the report was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,

    /// Fleet number of the vehicle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_number: Option<String>,

    /// Server-assigned timestamp of the report.
    pub recorded_at: DateTime<Utc>,
}

impl LocationReport {
    /// Build a report from validated input, stamping the current time.
    #[must_use]
    pub fn from_input(input: ReportInput) -> Self {
        Self {
            id: None,
            entity_id: input.entity_id,
            latitude: input.latitude,
            longitude: input.longitude,
            route_id: input.route_id,
            bus_number: input.bus_number,
            recorded_at: Utc::now(),
        }
    }

    /// The broadcast event for this report.
    #[must_use]
    pub fn to_update(&self) -> LocationUpdate {
        LocationUpdate {
            entity_id: self.entity_id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            route_id: self.route_id.clone(),
            bus_number: self.bus_number.clone(),
        }
    }
}

/// The event shape delivered to live subscribers.
///
/// Serialized on the wire as the payload of a `locationUpdate` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    /// Stable identifier of the tracked driver/bus.
    pub entity_id: String,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Route the entity is serving, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,

    /// Fleet number of the vehicle, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_number: Option<String>,
}
