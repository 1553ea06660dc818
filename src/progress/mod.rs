//! Progress tracking along the active route.
//!
//! [`RouteProgress`] is a derived value recomputed on every engine status
//! tick; [`ArrivalTracker`] turns progress into exactly-once arrival
//! events per destination.

mod arrival;
mod route_progress;

pub use arrival::{ArrivalEvent, ArrivalTracker};
pub use route_progress::RouteProgress;
