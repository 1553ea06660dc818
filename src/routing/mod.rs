//! Route computation boundary and proactive rerouting policy.

mod faster_route;
mod provider;

pub use faster_route::FasterRouteMonitor;
pub use provider::{RouteRequest, RoutingError, RoutingProvider};
