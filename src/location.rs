//! Boundary with the external location provider.
//!
//! Raw fixes arrive on their own stream, independent of the engine status
//! loop, and are forwarded to the engine without blocking status handling.

use crate::geo::LatLon;
use std::time::Instant;
use tokio::sync::broadcast;

/// A raw GPS fix with heading data.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    /// Raw (unmatched) coordinate.
    pub coordinate: LatLon,
    /// Direction of travel in degrees, if moving.
    pub bearing: Option<f64>,
    /// Compass heading in degrees, if available.
    pub heading: Option<f64>,
    /// Speed over ground in meters per second.
    pub speed: f64,
    /// When the fix was measured.
    pub timestamp: Instant,
}

/// Source of raw location and heading updates.
///
/// `start_updates`/`stop_updates` gate power-hungry hardware; subscribers
/// simply stop receiving fixes while updates are stopped.
pub trait LocationClient: Send + Sync {
    /// Begin producing location and heading fixes.
    fn start_updates(&self);

    /// Stop producing fixes.
    fn stop_updates(&self);

    /// Subscribe to the fix stream. The stream is unordered but
    /// monotonic: a later fix never carries an earlier timestamp.
    fn subscribe(&self) -> broadcast::Receiver<LocationFix>;
}
