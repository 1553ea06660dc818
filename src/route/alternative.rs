//! Alternative routes and their deltas against the main route.
//!
//! An alternative is always expressed *relative to* the current main route:
//! where it forks off, and how its distance and travel time compare. When
//! the main route changes, every alternative must be re-derived; the
//! orchestrator never reuses fork data across a main-route swap.

use super::model::{Route, RouteId, SharedRoute};
use std::time::Duration;

/// Engine-assigned alternative identifier, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlternativeId(pub u32);

impl std::fmt::Display for AlternativeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distance and expected travel time of a route section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteInfo {
    /// Distance in meters.
    pub distance: f64,
    /// Expected travel time.
    pub duration: Duration,
}

/// Position of a fork intersection within a route's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkGeometryIndices {
    /// Leg index within the route.
    pub leg_index: usize,
    /// Geometry index of the intersection within the leg.
    pub leg_geometry_index: usize,
    /// Geometry index of the intersection within the whole route.
    pub route_geometry_index: usize,
}

/// Where an alternative diverges from the main route.
///
/// Derived by the engine when a route set is accepted; locally promoted
/// bundles carry no fork info until the engine re-derives it (see
/// [`AlternativeRoute::provisional`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForkInfo {
    /// Fork intersection position on the main route geometry.
    pub main_route_indices: ForkGeometryIndices,
    /// Fork intersection position on the alternative route geometry.
    pub alternative_route_indices: ForkGeometryIndices,
    /// Alternative statistics counted from the fork point.
    pub info_from_fork: RouteInfo,
}

/// A candidate route the user may switch to mid-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeRoute {
    /// Engine-assigned identifier.
    pub id: AlternativeId,
    /// The underlying route.
    pub route: SharedRoute,
    /// Fork data relative to the current main route; `None` while a locally
    /// promoted bundle awaits engine re-derivation.
    pub fork: Option<ForkInfo>,
    /// Alternative statistics counted from its origin.
    pub info_from_origin: RouteInfo,
    /// Distance difference against the main route, in meters. Negative
    /// means the alternative is shorter.
    pub distance_delta: f64,
    /// Travel-time difference against the main route, in seconds. Negative
    /// means the alternative is faster.
    pub travel_time_delta: f64,
    /// Whether the user has already driven past the fork point. A passed
    /// alternative is hidden from the public list but retained until the
    /// next route replacement.
    pub is_fork_point_passed: bool,
}

impl AlternativeRoute {
    /// Build an alternative from engine-derived fork data, relative to
    /// `main`.
    pub fn relative_to(main: &Route, id: AlternativeId, route: SharedRoute, fork: ForkInfo) -> Self {
        let info_from_origin = RouteInfo {
            distance: route.distance,
            duration: route.expected_travel_time,
        };
        Self {
            distance_delta: info_from_origin.distance - main.distance,
            travel_time_delta: info_from_origin.duration.as_secs_f64()
                - main.expected_travel_time.as_secs_f64(),
            id,
            route,
            fork: Some(fork),
            info_from_origin,
            is_fork_point_passed: false,
        }
    }

    /// Build an alternative with deltas recomputed against `main` but no
    /// fork data yet.
    ///
    /// Used when a bundle is promoted locally (alternative selected as the
    /// new main): the engine supplies fork data for the whole set when the
    /// promoted bundle is pushed to it.
    pub fn provisional(main: &Route, id: AlternativeId, route: SharedRoute) -> Self {
        let info_from_origin = RouteInfo {
            distance: route.distance,
            duration: route.expected_travel_time,
        };
        Self {
            distance_delta: info_from_origin.distance - main.distance,
            travel_time_delta: info_from_origin.duration.as_secs_f64()
                - main.expected_travel_time.as_secs_f64(),
            id,
            route,
            fork: None,
            info_from_origin,
            is_fork_point_passed: false,
        }
    }

    /// Identifier of the underlying route.
    pub fn route_id(&self) -> &RouteId {
        &self.route.id
    }
}
