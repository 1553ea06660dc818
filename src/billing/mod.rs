//! Billing session lifecycle.
//!
//! Billing tracks wall-clock session time per trip type and must never
//! double-count. The handler deduplicates orchestrator sessions onto the
//! backend's one-session-per-type model and decides when a route change is
//! substantial enough to warrant a fresh active-guidance trip.

mod backend;
mod handler;

pub use backend::{BillingBackend, BillingError, SessionState, SessionType};
pub use handler::{BillingHandler, WAYPOINT_PROXIMITY_THRESHOLD_M};
