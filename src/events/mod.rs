//! Session state and typed event publication.
//!
//! Consumers subscribe to independent streams per event category through
//! [`EventHub`]; the orchestrator is the only publisher.

mod hub;
mod session;
mod types;

pub use hub::EventHub;
pub use session::{ActiveGuidanceState, FreeDriveState, Session, SessionState};
pub use types::{
    AlternativesStatus, FasterRoutesStatus, MapMatchingState, RefreshingStatus, ReroutingStatus,
    RoutesChanged, WaypointArrival,
};
