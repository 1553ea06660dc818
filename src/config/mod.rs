//! Navigator configuration.
//!
//! All knobs are plain values with defaults matching production behavior;
//! construct a [`NavigatorConfig`], adjust what you need, and hand it to
//! the orchestrator at startup.

mod faster_route;
mod policy;

pub use faster_route::FasterRouteConfig;
pub use policy::{
    AlternativesAcceptancePolicy, FasterRouteApproval, FasterRouteApprovalPolicy,
    LegAdvanceApproval, LegAdvancePolicy,
};

use crate::engine::EHorizonConfig;

/// Top-level configuration for a navigator instance.
#[derive(Clone)]
pub struct NavigatorConfig {
    /// Proactive faster-route monitoring.
    pub faster_route: FasterRouteConfig,
    /// How to accept a detected faster route.
    pub faster_route_approval: FasterRouteApprovalPolicy,
    /// How to advance to the next leg after a waypoint arrival.
    pub leg_advance: LegAdvancePolicy,
    /// Which engine-pushed continuous alternatives are offered.
    pub alternatives_acceptance: AlternativesAcceptancePolicy,
    /// Electronic-horizon tracking, started alongside active guidance when
    /// set.
    pub electronic_horizon: Option<EHorizonConfig>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            faster_route: FasterRouteConfig::default(),
            faster_route_approval: FasterRouteApprovalPolicy::Automatic,
            leg_advance: LegAdvancePolicy::Automatically,
            alternatives_acceptance: AlternativesAcceptancePolicy::default(),
            electronic_horizon: None,
        }
    }
}
