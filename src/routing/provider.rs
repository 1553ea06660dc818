//! Boundary to the external route computation service.

use crate::geo::LatLon;
use crate::route::{SharedRoute, Waypoint};
use async_trait::async_trait;
use thiserror::Error;

/// A request for routes from the current position through the remaining
/// waypoints.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Where the route should start; for reroutes, the current location.
    pub origin: LatLon,
    /// Direction of travel at the origin, degrees. Lets the service avoid
    /// proposing an immediate U-turn.
    pub bearing: Option<f64>,
    /// Remaining waypoints to visit, in order. The last one is the final
    /// destination.
    pub waypoints: Vec<Waypoint>,
}

/// Failures from the route computation service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// The request could not be completed.
    #[error("route request failed: {0}")]
    Network(String),
    /// The service answered but found no viable route.
    #[error("no routes found for the requested waypoints")]
    NoRoutes,
    /// The request was cancelled before completing.
    #[error("route request cancelled")]
    Cancelled,
}

/// Computes routes on demand.
///
/// Used for reactive reroutes and proactive faster-route checks. Requests
/// must be cancel-safe: dropping the returned future abandons the request.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Calculate candidate routes for `request`, best first.
    async fn calculate_routes(&self, request: RouteRequest) -> Result<Vec<SharedRoute>, RoutingError>;
}
