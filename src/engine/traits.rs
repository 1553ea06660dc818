//! The engine control seam.
//!
//! All "unwrap or bail" translation against the native map-matching engine
//! lives behind [`NavEngine`]; orchestration logic only ever sees explicit
//! `Result`s and typed values.

use super::events::{EHorizonConfig, EngineEvent};
use super::status::NavigationStatus;
use crate::location::LocationFix;
use crate::route::{AlternativeId, ForkInfo, RouteBundle, SharedRoute};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a route set is being pushed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRouteReason {
    /// A brand-new trip is starting.
    NewRoute,
    /// Reactive reroute after the user left the route.
    Reroute,
    /// The user selected an alternative route.
    Alternatives,
    /// A proactively found faster route was accepted.
    FasterRoute,
    /// The engine fell back to offline tiles.
    FallbackToOffline,
    /// The engine restored online routing.
    RestoreToOnline,
}

impl std::fmt::Display for SetRouteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewRoute => write!(f, "NewRoute"),
            Self::Reroute => write!(f, "Reroute"),
            Self::Alternatives => write!(f, "Alternatives"),
            Self::FasterRoute => write!(f, "FasterRoute"),
            Self::FallbackToOffline => write!(f, "FallbackToOffline"),
            Self::RestoreToOnline => write!(f, "RestoreToOnline"),
        }
    }
}

/// An alternative as accepted by the engine: the route plus fork data
/// derived relative to the accepted main route.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineAlternative {
    /// Engine-assigned id, unique within the session.
    pub id: AlternativeId,
    /// The alternative's route.
    pub route: SharedRoute,
    /// Fork data relative to the accepted main route.
    pub fork: ForkInfo,
}

/// Outcome of a successful route set.
#[derive(Debug, Clone, Default)]
pub struct SetRouteOutcome {
    /// Alternatives the engine accepted, re-derived relative to the
    /// (possibly adjusted) main route it acknowledged.
    pub alternatives: Vec<EngineAlternative>,
}

/// Failures at the engine boundary.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine rejected the route set.
    #[error("engine rejected route set: {0}")]
    SetRouteRejected(String),

    /// The engine had no route for the given session.
    #[error("no active route for session {0}")]
    NoActiveRoute(Uuid),

    /// The engine is unavailable (crashed, not initialized).
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Control API of the map-matching/route-progress engine.
///
/// Implementations wrap the native engine; the orchestrator is the only
/// caller. Status ticks and discrete events are delivered over broadcast
/// channels so a slow subscriber drops intermediate values instead of
/// blocking the engine.
#[async_trait]
pub trait NavEngine: Send + Sync {
    /// Push a route set for the given billing session.
    ///
    /// The engine may adjust the set (drop unusable alternatives); the
    /// outcome carries the accepted alternatives with fork data relative
    /// to the accepted main route.
    async fn set_route(
        &self,
        bundle: &RouteBundle,
        leg_index: usize,
        session_id: Uuid,
        reason: SetRouteReason,
    ) -> Result<SetRouteOutcome, EngineError>;

    /// Advance progress tracking to the given leg. Returns `false` when
    /// the engine refused (no route, index out of range).
    async fn update_leg(&self, leg_index: usize) -> bool;

    /// Drop the route for the given billing session.
    async fn unset_route(&self, session_id: Uuid) -> Result<(), EngineError>;

    /// Forward a raw location fix for map matching.
    async fn update_location(&self, fix: LocationFix);

    /// Suspend status production.
    fn pause(&self);

    /// Resume status production.
    fn resume(&self);

    /// Start electronic-horizon tracking.
    fn start_electronic_horizon(&self, config: EHorizonConfig);

    /// Stop electronic-horizon tracking.
    fn stop_electronic_horizon(&self);

    /// Subscribe to the per-tick status stream.
    fn subscribe_status(&self) -> broadcast::Receiver<NavigationStatus>;

    /// Subscribe to discrete engine events.
    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent>;
}
