//! Discrete events pushed by the navigation engine.
//!
//! Besides the per-tick status stream, the engine reports occasional
//! events: off-route reroutes it computed itself, continuous-alternative
//! updates, tileset fallbacks, annotation refreshes and electronic-horizon
//! notifications. Each is a typed variant consumed by the orchestrator's
//! event loop.

use super::traits::EngineAlternative;
use crate::route::SharedRoute;

/// An event pushed by the engine outside the status stream.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine detected the user left the route and started computing a
    /// replacement.
    RerouteDetected,
    /// The engine finished computing a reactive reroute.
    RerouteReceived {
        /// The new main route.
        main_route: SharedRoute,
        /// Alternatives relative to the new main route.
        alternatives: Vec<EngineAlternative>,
    },
    /// An in-progress reactive reroute was abandoned.
    RerouteCancelled,
    /// A reactive reroute failed.
    RerouteFailed {
        /// Engine-reported failure description.
        reason: String,
    },
    /// The engine's continuous-alternatives tracker produced a new set of
    /// alternatives for the current main route.
    AlternativesChanged {
        /// The new alternatives, relative to the current main route.
        alternatives: Vec<EngineAlternative>,
    },
    /// The engine fell back to offline tiles.
    FallbackToOffline,
    /// The engine switched back to the latest online tiles.
    RestoreToOnline,
    /// The engine refreshed route annotations (congestion, incidents).
    AnnotationsRefreshed {
        /// Refreshed main route, when the main route's annotations changed.
        main_route: Option<SharedRoute>,
        /// Refreshed alternatives relative to the (possibly updated) main.
        alternatives: Vec<EngineAlternative>,
        /// Leg index the refresh applies from.
        leg_index: usize,
    },
    /// An annotation refresh failed.
    AnnotationsRefreshFailed {
        /// `true` when the route's refresh TTL is exhausted and the bundle
        /// can no longer be refreshed.
        is_terminal: bool,
    },
    /// Electronic-horizon notification.
    ElectronicHorizon(EHorizonEvent),
}

/// Electronic-horizon notifications forwarded to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum EHorizonEvent {
    /// The most-probable-path tree was updated.
    PositionUpdated {
        /// Identifier of the edge the position is on.
        edge_id: u64,
        /// Whether this update changes the most probable path.
        updates_most_probable_path: bool,
    },
    /// The user entered a tracked road object.
    RoadObjectEntered {
        /// Road object identifier.
        object_id: String,
        /// Whether the object was entered from its start boundary.
        entered_from_start: bool,
    },
    /// The user exited a tracked road object.
    RoadObjectExited {
        /// Road object identifier.
        object_id: String,
        /// Whether the object was exited through its end boundary.
        exited_from_end: bool,
    },
    /// The user passed a point-like road object.
    RoadObjectPassed {
        /// Road object identifier.
        object_id: String,
    },
}

/// Electronic-horizon tracking configuration passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EHorizonConfig {
    /// Horizon length along the most probable path, meters.
    pub length: f64,
    /// Horizon expansion along side branches, meters.
    pub expansion: f64,
    /// Minimum distance to retain behind the user, meters.
    pub branch_length: f64,
}

impl Default for EHorizonConfig {
    fn default() -> Self {
        Self {
            length: 1_500.0,
            expansion: 150.0,
            branch_length: 50.0,
        }
    }
}
