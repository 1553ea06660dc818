//! Geographic coordinate helpers.
//!
//! Provides the [`LatLon`] value type and great-circle distance used for
//! waypoint comparison. The orchestrator never does route-geometry math
//! beyond this; geometry belongs to the external routing engine.

use std::f64::consts::PI;

/// Mean Earth radius in meters (IUGG value).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
}

impl LatLon {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another coordinate, in meters.
    ///
    /// Uses the haversine formula, which is accurate to well under a meter
    /// at the distances relevant here (waypoint proximity checks).
    pub fn distance_to(&self, other: &LatLon) -> f64 {
        let lat1 = self.latitude * PI / 180.0;
        let lat2 = other.latitude * PI / 180.0;
        let d_lat = (other.latitude - self.latitude) * PI / 180.0;
        let d_lon = (other.longitude - self.longitude) * PI / 180.0;

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}
