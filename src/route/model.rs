//! Core route value types.
//!
//! These are plain in-process values produced by the external route
//! computation service and consumed by the orchestrator. The orchestrator
//! never edits geometry; it only selects, replaces and tracks routes.

use crate::geo::LatLon;
use std::sync::Arc;
use std::time::Duration;

/// Stable identifier of a route within a navigation session.
///
/// Assigned by the route computation service; unique for the lifetime of
/// the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named stop along a route.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Human-readable name, if known.
    pub name: Option<String>,
    /// Snapped coordinate of the stop.
    pub coordinate: LatLon,
}

impl Waypoint {
    pub fn new(coordinate: LatLon) -> Self {
        Self {
            name: None,
            coordinate,
        }
    }

    pub fn named(name: impl Into<String>, coordinate: LatLon) -> Self {
        Self {
            name: Some(name.into()),
            coordinate,
        }
    }
}

/// A single maneuver-to-maneuver section of a route leg.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
    /// Maneuver instruction text ("Turn right onto Elm Street").
    pub instruction: String,
    /// Step length in meters.
    pub distance: f64,
    /// Expected travel time for the step.
    pub expected_travel_time: Duration,
    /// Coordinate of the maneuver that starts this step.
    pub maneuver_location: LatLon,
}

/// A section of a route between two waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    /// Steps within the leg, in travel order.
    pub steps: Vec<RouteStep>,
    /// The waypoint the leg departs from; only the first leg carries one.
    pub source: Option<Waypoint>,
    /// The waypoint the leg arrives at.
    pub destination: Option<Waypoint>,
    /// Leg length in meters.
    pub distance: f64,
    /// Expected travel time for the leg.
    pub expected_travel_time: Duration,
}

/// A complete route from origin to final destination.
///
/// Routes are immutable once produced; replacing a route means publishing a
/// new [`Route`] value. Shared via [`Arc`] in [`crate::route::RouteBundle`]
/// so clones stay cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Identifier assigned by the routing service.
    pub id: RouteId,
    /// Legs in travel order; never empty for a valid route.
    pub legs: Vec<RouteLeg>,
    /// Total length in meters.
    pub distance: f64,
    /// Total expected travel time.
    pub expected_travel_time: Duration,
}

impl Route {
    /// All waypoints along the route: the first leg's source followed by
    /// every leg's destination.
    pub fn waypoints(&self) -> Vec<Waypoint> {
        let mut waypoints = Vec::with_capacity(self.legs.len() + 1);
        if let Some(first) = self.legs.first() {
            if let Some(source) = &first.source {
                waypoints.push(source.clone());
            }
        }
        for leg in &self.legs {
            if let Some(destination) = &leg.destination {
                waypoints.push(destination.clone());
            }
        }
        waypoints
    }

    /// Destination waypoints of every leg, in travel order.
    pub fn leg_destinations(&self) -> Vec<Waypoint> {
        self.legs
            .iter()
            .filter_map(|leg| leg.destination.clone())
            .collect()
    }

    /// Textual signature of the route used for similarity comparison.
    ///
    /// Concatenates every step instruction in travel order. Two routes that
    /// follow the same roads produce near-identical signatures even when
    /// their timing annotations differ.
    pub fn signature(&self) -> String {
        let mut signature = String::new();
        for leg in &self.legs {
            for step in &leg.steps {
                signature.push_str(&step.instruction);
                signature.push('\n');
            }
        }
        signature
    }
}

/// Cheaply cloneable shared route.
pub type SharedRoute = Arc<Route>;
