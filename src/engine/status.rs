//! Status records emitted by the map-matching engine.
//!
//! One status is produced per location tick. Statuses are idempotent and
//! derivable from the latest fix only, so intermediate ticks may be dropped
//! under load without losing information.

use crate::geo::LatLon;
use crate::route::AlternativeId;
use std::time::Duration;

/// Engine-reported tracking state along the active route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// A route was just set; tracking has not stabilized yet.
    Initialized,
    /// The user is progressing along the route.
    Tracking,
    /// The engine cannot currently judge whether the user is on the route.
    Uncertain,
    /// The user has left the route.
    OffRoute,
    /// The user has arrived at the current leg's destination.
    Complete,
}

impl std::fmt::Display for RouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "Initialized"),
            Self::Tracking => write!(f, "Tracking"),
            Self::Uncertain => write!(f, "Uncertain"),
            Self::OffRoute => write!(f, "OffRoute"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// A GPS fix snapped to the road graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedLocation {
    /// Snapped coordinate.
    pub coordinate: LatLon,
    /// Direction of travel in degrees, if moving.
    pub bearing: Option<f64>,
    /// Speed over ground in meters per second.
    pub speed: f64,
    /// Name of the matched road, if known.
    pub road_name: Option<String>,
}

/// Fork-passed flag for one alternative, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlternativeForkStatus {
    /// Engine-assigned alternative id.
    pub id: AlternativeId,
    /// Whether the user has driven past this alternative's fork point.
    pub is_fork_point_passed: bool,
}

/// One map-matched status tick.
///
/// Leg and step indices are the engine's own; the progress tracker uses
/// them verbatim instead of re-deriving position to stay consistent with
/// the black-box map matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStatus {
    /// Tracking state along the active route.
    pub route_state: RouteState,
    /// The snapped location for this tick.
    pub location: MatchedLocation,
    /// Index of the current leg.
    pub leg_index: usize,
    /// Index of the current step within the leg.
    pub step_index: usize,
    /// Remaining distance on the current step, meters.
    pub step_distance_remaining: f64,
    /// Remaining travel time on the current step.
    pub step_duration_remaining: Duration,
    /// Remaining distance on the current leg, meters.
    pub leg_distance_remaining: f64,
    /// Remaining travel time on the current leg.
    pub leg_duration_remaining: Duration,
    /// Remaining distance on the whole route, meters.
    pub route_distance_remaining: f64,
    /// Remaining travel time on the whole route.
    pub route_duration_remaining: Duration,
    /// Fork-passed flags for the currently tracked alternatives.
    pub alternatives: Vec<AlternativeForkStatus>,
}

impl NavigationStatus {
    /// Ids of alternatives whose fork point this status reports as passed.
    pub fn passed_fork_ids(&self) -> std::collections::HashSet<AlternativeId> {
        self.alternatives
            .iter()
            .filter(|alt| alt.is_fork_point_passed)
            .map(|alt| alt.id)
            .collect()
    }
}
