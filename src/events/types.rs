//! Payloads for the published event streams.

use crate::engine::{MatchedLocation, SetRouteReason};
use crate::route::{AlternativeRoute, RouteBundle, RouteId, SharedRoute, Waypoint};
use std::sync::Arc;

/// Latest map-matching result, emitted on every status tick while a
/// session is running.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMatchingState {
    /// The snapped location.
    pub location: MatchedLocation,
    /// Whether the engine currently considers the user off the road graph
    /// it is matching against.
    pub off_road: bool,
}

/// The active route bundle changed.
#[derive(Debug, Clone)]
pub struct RoutesChanged {
    /// The bundle that is now current.
    pub bundle: Arc<RouteBundle>,
    /// Why the bundle changed.
    pub reason: SetRouteReason,
}

/// Arrival notifications along the active route.
#[derive(Debug, Clone, PartialEq)]
pub enum WaypointArrival {
    /// Arrived at an intermediate waypoint; the leg has not advanced yet.
    ToWaypoint {
        /// The waypoint arrived at.
        waypoint: Waypoint,
        /// Index of the completed leg.
        leg_index: usize,
    },
    /// Arrived at the final destination.
    ToFinalDestination {
        /// The waypoint arrived at.
        waypoint: Waypoint,
    },
    /// The next leg began, either automatically or after external approval.
    NextLegStarted {
        /// Index of the leg now being traveled.
        leg_index: usize,
    },
}

/// Reactive rerouting progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ReroutingStatus {
    /// No reroute in progress.
    Idle,
    /// The engine reported off-route; a replacement route is being fetched.
    FetchingRoute,
    /// An in-flight reroute was superseded or the session left guidance.
    Interrupted,
    /// The reroute fetch failed.
    Failed {
        /// Failure description from the routing service.
        message: String,
    },
}

/// Continuous-alternatives updates.
#[derive(Debug, Clone)]
pub enum AlternativesStatus {
    /// The externally visible alternatives list changed.
    Updated {
        /// Alternatives currently offered, fork-passed ones excluded.
        alternatives: Vec<AlternativeRoute>,
    },
    /// The engine failed to update alternatives.
    Failed {
        /// Failure description.
        message: String,
    },
}

/// Proactive faster-route monitoring results.
#[derive(Debug, Clone)]
pub enum FasterRoutesStatus {
    /// A faster candidate passed every acceptance gate.
    Detected {
        /// The faster route.
        route: SharedRoute,
    },
    /// A detected faster route was activated as the new main route.
    Applied {
        /// Id of the route now being tracked.
        route_id: RouteId,
    },
    /// A check completed without finding an acceptable faster route.
    NoFasterRoute,
}

/// Incremental annotation-refresh progress for the active bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshingStatus {
    /// No refresh has completed for the active bundle yet.
    Idle,
    /// The bundle's annotations were updated in place.
    Refreshed,
    /// The refresh failed; `is_terminal` means the bundle's refresh
    /// deadline has passed and no further attempts will be made.
    Failed {
        /// Whether refresh attempts for this bundle have stopped for good.
        is_terminal: bool,
    },
}
