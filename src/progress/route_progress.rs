//! Derived progress along the active route.

use crate::engine::{NavigationStatus, RouteState};
use crate::route::{RouteBundle, RouteLeg, RouteStep, Waypoint};
use std::sync::Arc;
use std::time::Duration;

/// Remaining steps at or below this count mark the leg as near its end.
pub(crate) const ARRIVAL_REMAINING_STEPS: usize = 2;

/// Progress along the active route, derived from one engine status tick.
///
/// Recomputed, never mutated: every tick produces a fresh value that
/// replaces the previous one. Leg and step indices come from the engine
/// verbatim so this view never disagrees with the map matcher.
#[derive(Debug, Clone)]
pub struct RouteProgress {
    bundle: Arc<RouteBundle>,
    route_state: RouteState,
    leg_index: usize,
    step_index: usize,
    step_distance_remaining: f64,
    step_duration_remaining: Duration,
    leg_distance_remaining: f64,
    leg_duration_remaining: Duration,
    route_distance_remaining: f64,
    route_duration_remaining: Duration,
}

impl RouteProgress {
    /// Derive progress from the latest engine status against `bundle`.
    pub fn from_status(bundle: Arc<RouteBundle>, status: &NavigationStatus) -> Self {
        Self {
            bundle,
            route_state: status.route_state,
            leg_index: status.leg_index,
            step_index: status.step_index,
            step_distance_remaining: status.step_distance_remaining,
            step_duration_remaining: status.step_duration_remaining,
            leg_distance_remaining: status.leg_distance_remaining,
            leg_duration_remaining: status.leg_duration_remaining,
            route_distance_remaining: status.route_distance_remaining,
            route_duration_remaining: status.route_duration_remaining,
        }
    }

    /// Progress for a freshly activated bundle, before the first status
    /// tick arrives. Remaining figures cover the legs from `leg_index` on.
    pub fn initial(bundle: Arc<RouteBundle>, leg_index: usize) -> Self {
        let legs = &bundle.main_route().legs;
        let remaining_distance: f64 = legs.iter().skip(leg_index).map(|leg| leg.distance).sum();
        let remaining_duration: Duration = legs
            .iter()
            .skip(leg_index)
            .map(|leg| leg.expected_travel_time)
            .sum();
        let (leg_distance, leg_duration, step_distance, step_duration) = legs
            .get(leg_index)
            .map(|leg| {
                let step = leg.steps.first();
                (
                    leg.distance,
                    leg.expected_travel_time,
                    step.map(|s| s.distance).unwrap_or(0.0),
                    step.map(|s| s.expected_travel_time).unwrap_or(Duration::ZERO),
                )
            })
            .unwrap_or((0.0, Duration::ZERO, 0.0, Duration::ZERO));

        Self {
            bundle,
            route_state: RouteState::Initialized,
            leg_index,
            step_index: 0,
            step_distance_remaining: step_distance,
            step_duration_remaining: step_duration,
            leg_distance_remaining: leg_distance,
            leg_duration_remaining: leg_duration,
            route_distance_remaining: remaining_distance,
            route_duration_remaining: remaining_duration,
        }
    }

    /// The bundle this progress was derived against.
    pub fn bundle(&self) -> &Arc<RouteBundle> {
        &self.bundle
    }

    /// Engine-reported tracking state at the tick this was derived from.
    pub fn route_state(&self) -> RouteState {
        self.route_state
    }

    /// Index of the current leg.
    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    /// Index of the current step within the leg.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Remaining distance on the current step, meters.
    pub fn step_distance_remaining(&self) -> f64 {
        self.step_distance_remaining
    }

    /// Remaining travel time on the current step.
    pub fn step_duration_remaining(&self) -> Duration {
        self.step_duration_remaining
    }

    /// Remaining distance on the current leg, meters.
    pub fn leg_distance_remaining(&self) -> f64 {
        self.leg_distance_remaining
    }

    /// Remaining travel time on the current leg.
    pub fn leg_duration_remaining(&self) -> Duration {
        self.leg_duration_remaining
    }

    /// Remaining distance on the whole route, meters.
    pub fn route_distance_remaining(&self) -> f64 {
        self.route_distance_remaining
    }

    /// Remaining travel time on the whole route.
    pub fn route_duration_remaining(&self) -> Duration {
        self.route_duration_remaining
    }

    /// Fraction of the route's total distance already traveled, 0.0..=1.0.
    pub fn fraction_traveled(&self) -> f64 {
        let total = self.bundle.main_route().distance;
        if total <= 0.0 {
            return 1.0;
        }
        ((total - self.route_distance_remaining) / total).clamp(0.0, 1.0)
    }

    /// The leg currently being traveled, if the engine index is valid.
    pub fn current_leg(&self) -> Option<&RouteLeg> {
        self.bundle.main_route().legs.get(self.leg_index)
    }

    /// The step currently being traveled.
    pub fn current_step(&self) -> Option<&RouteStep> {
        self.current_leg()?.steps.get(self.step_index)
    }

    /// The step after the current one, crossing into the next leg if needed.
    pub fn upcoming_step(&self) -> Option<&RouteStep> {
        let leg = self.current_leg()?;
        if let Some(step) = leg.steps.get(self.step_index + 1) {
            return Some(step);
        }
        self.bundle
            .main_route()
            .legs
            .get(self.leg_index + 1)?
            .steps
            .first()
    }

    /// Steps left in the current leg, including the current one.
    pub fn remaining_steps_in_leg(&self) -> usize {
        self.current_leg()
            .map(|leg| leg.steps.len().saturating_sub(self.step_index))
            .unwrap_or(0)
    }

    /// Destinations of the current and all following legs, in travel order.
    pub fn remaining_waypoints(&self) -> Vec<Waypoint> {
        self.bundle
            .main_route()
            .legs
            .iter()
            .skip(self.leg_index)
            .filter_map(|leg| leg.destination.clone())
            .collect()
    }

    /// Whether the current leg is the route's last.
    pub fn is_final_leg(&self) -> bool {
        self.leg_index + 1 >= self.bundle.main_route().legs.len()
    }

    /// Whether the user is about to arrive at the current leg's destination.
    ///
    /// Requires both a near-empty step queue and an engine-confirmed
    /// `Complete` state so a GPS jump near the destination does not fire
    /// arrival early.
    pub fn is_approaching_arrival(&self) -> bool {
        self.remaining_steps_in_leg() <= ARRIVAL_REMAINING_STEPS
            && self.route_state == RouteState::Complete
    }
}
