//! Boundary with the external map-matching/route-progress engine.
//!
//! The engine is a black box: it snaps raw GPS fixes to the road graph,
//! tracks progress along the active route set, detects off-route
//! departures and computes reactive reroutes. This module defines the
//! typed contract the orchestrator consumes: statuses, discrete events
//! and the control API.

mod events;
mod status;
mod traits;

pub use events::{EHorizonConfig, EHorizonEvent, EngineEvent};
pub use status::{AlternativeForkStatus, MatchedLocation, NavigationStatus, RouteState};
pub use traits::{
    EngineAlternative, EngineError, NavEngine, SetRouteOutcome, SetRouteReason,
};
