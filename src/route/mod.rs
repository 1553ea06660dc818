//! Route values: the main route, its alternatives, and similarity tooling.
//!
//! The orchestrator treats routes as opaque values produced by the external
//! route computation service. This module owns the bundle abstraction used
//! for route replacement and the textual-similarity comparison reused by
//! both the rerouting policy and the billing heuristic.

mod alternative;
mod bundle;
mod model;
pub mod similarity;

pub use alternative::{
    AlternativeId, AlternativeRoute, ForkGeometryIndices, ForkInfo, RouteInfo,
};
pub use bundle::RouteBundle;
pub use model::{Route, RouteId, RouteLeg, RouteStep, SharedRoute, Waypoint};

#[cfg(test)]
pub(crate) use model::test_support;
