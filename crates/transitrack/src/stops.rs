//! Stop index for nearest-stop queries.
//!
//! Stops are read-mostly reference data. The index holds them in memory
//! and answers nearest-neighbor queries by great-circle distance with a
//! linear scan, which is fine for a bounded, slowly-growing stop set.
//! A spatial index (grid or R-tree) could replace the scan without
//! changing the contract.

use std::cmp::Ordering;
use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::report::{latitude_in_range, longitude_in_range};
use crate::storage::Storage;

/// Mean Earth radius in kilometers, as used by the haversine formula.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A named geographic point served by the transit network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopPoint {
    /// Stable stop identifier.
    pub id: i64,
    /// Human-readable stop name.
    pub name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl StopPoint {
    /// Create a new stop.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// The result of a nearest-stop query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestStop {
    /// The winning stop.
    #[serde(flatten)]
    pub stop: StopPoint,
    /// Great-circle distance from the query point in kilometers.
    pub distance_km: f64,
}

/// Shape of a stop seed file.
#[derive(Debug, Deserialize)]
struct StopSeedFile {
    stops: Vec<StopPoint>,
}

/// In-memory nearest-neighbor index over the configured stops.
#[derive(Debug, Clone, Default)]
pub struct StopIndex {
    stops: Vec<StopPoint>,
}

impl StopIndex {
    /// Build an index over the given stops.
    #[must_use]
    pub fn new(stops: Vec<StopPoint>) -> Self {
        Self { stops }
    }

    /// Build an index from all stops in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop rows cannot be read.
    pub fn from_storage(storage: &Storage) -> Result<Self> {
        Ok(Self::new(storage.stops()?))
    }

    /// Number of stops in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Check whether the index holds no stops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Find the stop nearest to the query point.
    ///
    /// Distance is great-circle (haversine) distance in kilometers;
    /// ties are broken by the lowest stop id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the query coordinates are out
    /// of range, or [`Error::EmptyIndex`] if no stops are configured.
    pub fn nearest(&self, latitude: f64, longitude: f64) -> Result<NearestStop> {
        if !latitude_in_range(latitude) {
            return Err(Error::invalid_input(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        if !longitude_in_range(longitude) {
            return Err(Error::invalid_input(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }

        self.stops
            .iter()
            .map(|stop| {
                let distance_km =
                    haversine_km((latitude, longitude), (stop.latitude, stop.longitude));
                NearestStop {
                    stop: stop.clone(),
                    distance_km,
                }
            })
            .min_by(|a, b| {
                a.distance_km
                    .partial_cmp(&b.distance_km)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.stop.id.cmp(&b.stop.id))
            })
            .ok_or(Error::EmptyIndex)
    }
}

/// Calculate the great-circle distance between two positions.
///
/// Uses the haversine formula. Positions are (latitude, longitude)
/// pairs in degrees; the result is in kilometers.
#[must_use]
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Load stops from a TOML seed file.
///
/// The file holds a `stops` array of `{ id, name, latitude, longitude }`
/// tables.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any
/// stop carries out-of-range coordinates.
pub fn load_seed_file(path: impl AsRef<Path>) -> Result<Vec<StopPoint>> {
    let seed: StopSeedFile = Figment::new()
        .merge(Toml::file(path.as_ref()))
        .extract()?;

    for stop in &seed.stops {
        if !latitude_in_range(stop.latitude) || !longitude_in_range(stop.longitude) {
            return Err(Error::invalid_input(format!(
                "stop {} '{}' has out-of-range coordinates",
                stop.id, stop.name
            )));
        }
    }

    Ok(seed.stops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> StopIndex {
        StopIndex::new(vec![
            StopPoint::new(1, "A", 0.0, 0.0),
            StopPoint::new(2, "B", 1.0, 1.0),
            StopPoint::new(3, "C", -1.0, -1.0),
        ])
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is roughly 111 km.
        let d = haversine_km((0.0, 0.0), (1.0, 0.0));
        assert!((d - 111.2).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_haversine_zero_distance() {
        let d = haversine_km((48.85, 2.35), (48.85, 2.35));
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = (51.5, -0.12);
        let b = (48.85, 2.35);
        let d1 = haversine_km(a, b);
        let d2 = haversine_km(b, a);
        assert!((d1 - d2).abs() < 1e-9);
        // London to Paris is about 344 km
        assert!((d1 - 344.0).abs() < 5.0, "got {d1}");
    }

    #[test]
    fn test_nearest_picks_closest() {
        let index = sample_index();
        let nearest = index.nearest(0.1, 0.1).unwrap();
        assert_eq!(nearest.stop.id, 1);
        assert_eq!(nearest.stop.name, "A");
        assert!(nearest.distance_km > 0.0);
    }

    #[test]
    fn test_nearest_empty_index() {
        let index = StopIndex::default();
        let err = index.nearest(0.0, 0.0).unwrap_err();
        assert!(matches!(err, Error::EmptyIndex));
    }

    #[test]
    fn test_nearest_rejects_out_of_range_latitude() {
        let index = sample_index();
        let err = index.nearest(91.0, 0.0).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_nearest_rejects_non_finite() {
        let index = sample_index();
        assert!(index.nearest(f64::NAN, 0.0).unwrap_err().is_invalid_input());
        assert!(index
            .nearest(0.0, f64::INFINITY)
            .unwrap_err()
            .is_invalid_input());
    }

    #[test]
    fn test_nearest_tie_breaks_by_lowest_id() {
        // Two stops equidistant from the query point.
        let index = StopIndex::new(vec![
            StopPoint::new(7, "East", 0.0, 1.0),
            StopPoint::new(3, "West", 0.0, -1.0),
        ]);
        let nearest = index.nearest(0.0, 0.0).unwrap();
        assert_eq!(nearest.stop.id, 3);
    }

    #[test]
    fn test_index_len() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
        assert!(StopIndex::default().is_empty());
    }

    #[test]
    fn test_from_storage() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .upsert_stop(&StopPoint::new(1, "Depot", 10.0, 10.0))
            .unwrap();

        let index = StopIndex::from_storage(&storage).unwrap();
        assert_eq!(index.len(), 1);
        let nearest = index.nearest(10.0, 10.0).unwrap();
        assert_eq!(nearest.stop.name, "Depot");
        assert!(nearest.distance_km < 1e-9);
    }

    #[test]
    fn test_nearest_stop_serializes_flat() {
        let nearest = NearestStop {
            stop: StopPoint::new(4, "Plaza", 1.0, 2.0),
            distance_km: 0.5,
        };
        let json = serde_json::to_value(&nearest).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["name"], "Plaza");
        assert_eq!(json["distanceKm"], 0.5);
    }

    #[test]
    fn test_load_seed_file() {
        let temp_dir = std::env::temp_dir();
        let path = temp_dir.join(format!("transitrack_stops_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[[stops]]
id = 1
name = "Main Street"
latitude = 51.5
longitude = -0.12

[[stops]]
id = 2
name = "Market Square"
latitude = 51.51
longitude = -0.1
"#,
        )
        .unwrap();

        let stops = load_seed_file(&path).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].name, "Main Street");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_seed_file_rejects_bad_coordinates() {
        let temp_dir = std::env::temp_dir();
        let path = temp_dir.join(format!("transitrack_badstops_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[[stops]]
id = 1
name = "Nowhere"
latitude = 123.0
longitude = 0.0
"#,
        )
        .unwrap();

        let err = load_seed_file(&path).unwrap_err();
        assert!(err.is_invalid_input());

        let _ = std::fs::remove_file(&path);
    }
}
