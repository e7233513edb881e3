//! Location ingest pipeline.
//!
//! Validates incoming position reports, persists them, and publishes
//! them to the broadcast hub. Both the REST path and the live streamed
//! path go through [`LocationIngest::submit`], so every accepted report
//! lands in the same table and reaches the same subscribers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hub::BroadcastHub;
use crate::report::{LocationReport, ReportInput};
use crate::storage::Storage;

/// Validate a client-supplied report.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the entity id is empty or the
/// coordinates are non-finite or out of range.
pub fn validate(input: &ReportInput) -> Result<()> {
    if input.entity_id.trim().is_empty() {
        return Err(Error::invalid_input("entityId must not be empty"));
    }
    if !crate::report::latitude_in_range(input.latitude) {
        return Err(Error::invalid_input(format!(
            "latitude {} out of range [-90, 90]",
            input.latitude
        )));
    }
    if !crate::report::longitude_in_range(input.longitude) {
        return Err(Error::invalid_input(format!(
            "longitude {} out of range [-180, 180]",
            input.longitude
        )));
    }
    Ok(())
}

/// The ingest service: validate, persist, then publish.
#[derive(Debug, Clone)]
pub struct LocationIngest {
    storage: Arc<Mutex<Storage>>,
    hub: Arc<BroadcastHub>,
}

impl LocationIngest {
    /// Create an ingest service over shared storage and hub handles.
    #[must_use]
    pub fn new(storage: Arc<Mutex<Storage>>, hub: Arc<BroadcastHub>) -> Self {
        Self { storage, hub }
    }

    /// Handle to the broadcast hub this service publishes to.
    #[must_use]
    pub fn hub(&self) -> Arc<BroadcastHub> {
        Arc::clone(&self.hub)
    }

    /// Submit a position report.
    ///
    /// On success the report has been durably written exactly once and
    /// published to the hub exactly once, in that order, so subscribers
    /// never see a location that is not yet durable. The server assigns
    /// the timestamp; client clocks are never trusted.
    ///
    /// A broadcast that reaches no subscribers is not an error: the
    /// persisted write stands, and the miss is logged as an
    /// observability event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on validation failure (nothing is
    /// persisted), or a storage error if the durable write fails (the
    /// caller may retry the whole submission).
    pub fn submit(&self, input: ReportInput) -> Result<LocationReport> {
        validate(&input)?;

        let mut report = LocationReport::from_input(input);

        // Lock scope covers only the single-row insert, never the
        // hub fan-out.
        let id = self.lock_storage().insert_report(&report)?;
        report.id = Some(id);

        let delivered = self.hub.publish(&report.to_update());
        debug!(
            entity_id = %report.entity_id,
            report_id = id,
            delivered,
            "Location report persisted and published"
        );
        Ok(report)
    }

    /// Get the latest persisted report for an entity.
    ///
    /// Consults durable storage directly on every call; there is no
    /// cache layer in front of it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entity has no reports, or a
    /// storage error if the read fails.
    pub fn latest(&self, entity_id: &str) -> Result<LocationReport> {
        if entity_id.trim().is_empty() {
            return Err(Error::invalid_input("entityId must not be empty"));
        }
        self.lock_storage().latest(entity_id)
    }

    /// Submit a report from the live stream, fire-and-forget.
    ///
    /// Invalid or unpersistable events are logged and dropped; the
    /// stream stays up either way.
    pub fn submit_streamed(&self, input: ReportInput) {
        match self.submit(input) {
            Ok(report) => {
                debug!(entity_id = %report.entity_id, "Streamed report accepted");
            }
            Err(err) if err.is_invalid_input() => {
                warn!("Dropping invalid streamed report: {err}");
            }
            Err(err) => {
                warn!("Failed to persist streamed report: {err}");
            }
        }
    }

    fn lock_storage(&self) -> MutexGuard<'_, Storage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
