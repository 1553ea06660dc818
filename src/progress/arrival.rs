//! Exactly-once arrival detection.

use super::RouteProgress;
use crate::route::Waypoint;

/// A confirmed arrival at a destination along the route.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalEvent {
    /// Arrived at an intermediate leg destination.
    Waypoint {
        /// Index of the leg whose destination was reached.
        leg_index: usize,
        /// The waypoint arrived at.
        waypoint: Waypoint,
    },
    /// Arrived at the route's final destination.
    FinalDestination {
        /// The waypoint arrived at.
        waypoint: Waypoint,
    },
}

/// Deduplicates arrival events per destination.
///
/// Arrival fires once per waypoint. Lingering near a destination keeps the
/// engine in `Complete` state across many ticks; comparing against the
/// previously recorded arrival waypoint keeps those ticks silent.
#[derive(Debug, Default)]
pub struct ArrivalTracker {
    previous_arrival: Option<Waypoint>,
}

impl ArrivalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the latest progress for a new arrival.
    ///
    /// Returns `Some` exactly once per destination; re-arriving at the same
    /// waypoint returns `None`.
    pub fn check(&mut self, progress: &RouteProgress) -> Option<ArrivalEvent> {
        if !progress.is_approaching_arrival() {
            return None;
        }
        let destination = progress.current_leg()?.destination.clone()?;
        if self.previous_arrival.as_ref() == Some(&destination) {
            return None;
        }
        self.previous_arrival = Some(destination.clone());
        if progress.is_final_leg() {
            Some(ArrivalEvent::FinalDestination {
                waypoint: destination,
            })
        } else {
            Some(ArrivalEvent::Waypoint {
                leg_index: progress.leg_index(),
                waypoint: destination,
            })
        }
    }

    /// Forget the recorded arrival. Called when a new route is activated so
    /// the new route's destinations can fire again.
    pub fn reset(&mut self) {
        self.previous_arrival = None;
    }
}
