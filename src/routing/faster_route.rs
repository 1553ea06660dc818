//! Proactive faster-route monitoring.
//!
//! While in active guidance the orchestrator periodically asks whether a
//! faster route exists for the remaining trip. The monitor owns the gating
//! state (last check time, staleness generation) and the pure candidate
//! evaluation; the actual fetch and activation live in the orchestrator.

use crate::config::FasterRouteConfig;
use crate::progress::RouteProgress;
use crate::route::{similarity, RouteStep, SharedRoute};
use std::time::Instant;
use tracing::debug;

/// Gating and candidate evaluation for proactive faster-route checks.
pub struct FasterRouteMonitor {
    config: FasterRouteConfig,
    last_check: Option<Instant>,
    /// Bumped on every new check and on session changes; results carrying
    /// an older generation are stale and must be discarded.
    generation: u64,
}

impl FasterRouteMonitor {
    pub fn new(config: FasterRouteConfig) -> Self {
        Self {
            config,
            last_check: None,
            generation: 0,
        }
    }

    /// Whether a proactive check should run now.
    ///
    /// All gates must pass: monitoring enabled, no reroute already in
    /// flight, enough trip remaining to be worth rerouting, no imminent
    /// maneuver, and the configured interval elapsed since the last check.
    pub fn should_check(
        &self,
        now: Instant,
        progress: &RouteProgress,
        reroute_in_flight: bool,
    ) -> bool {
        if !self.config.enabled || reroute_in_flight {
            return false;
        }
        if progress.route_duration_remaining() < self.config.min_remaining_duration {
            return false;
        }
        if progress.step_duration_remaining() < self.config.min_maneuver_offset {
            return false;
        }
        match self.last_check {
            None => true,
            Some(last) => now.duration_since(last) >= self.config.check_interval,
        }
    }

    /// Record that a check is starting and return its generation token.
    pub fn begin_check(&mut self, now: Instant) -> u64 {
        self.last_check = Some(now);
        self.generation += 1;
        self.generation
    }

    /// Whether a result produced under `generation` is still current.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Invalidate any in-flight check, for example when the session leaves
    /// active guidance or the route is replaced underneath the check.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Evaluate fetched candidates against the current route.
    ///
    /// Picks the candidate most similar to the tracked route so repeated
    /// checks do not oscillate between structurally different but equally
    /// fast routes. When no candidate resembles the tracked route, falls
    /// back to the first one, since candidates arrive sorted fastest
    /// first. Either way the pick is accepted only when it is genuinely
    /// faster and still begins with the user's anticipated maneuver.
    pub fn select_faster(
        &self,
        candidates: &[SharedRoute],
        progress: &RouteProgress,
    ) -> Option<SharedRoute> {
        let current = progress.bundle().main_route();
        let best = similarity::most_similar_index(candidates, current)?;
        let candidate = if best.is_similar {
            &candidates[best.index]
        } else {
            debug!(
                score = best.score,
                "no candidate resembles the tracked route, taking the fastest"
            );
            candidates.first()?
        };

        let remaining = progress.route_duration_remaining();
        let threshold = remaining.mul_f64(self.config.acceptance_ratio);
        if candidate.expected_travel_time > threshold {
            debug!(
                candidate = %candidate.id,
                candidate_secs = candidate.expected_travel_time.as_secs(),
                threshold_secs = threshold.as_secs(),
                "faster-route candidate not fast enough"
            );
            return None;
        }

        let first_step = candidate.legs.first()?.steps.first()?;
        if first_step.expected_travel_time < self.config.min_maneuver_offset {
            debug!(
                candidate = %candidate.id,
                "faster-route candidate maneuvers too soon to switch safely"
            );
            return None;
        }

        let upcoming = progress.upcoming_step()?;
        let candidate_maneuver = first_maneuver(candidate)?;
        if candidate_maneuver.instruction != upcoming.instruction {
            debug!(
                candidate = %candidate.id,
                "faster-route candidate diverges before the anticipated maneuver"
            );
            return None;
        }

        debug!(
            candidate = %candidate.id,
            score = best.score,
            "faster-route candidate accepted"
        );
        Some(candidate.clone())
    }
}

/// The first real maneuver of a freshly computed route.
///
/// Candidates start at the current location, so their first step is the
/// departure; the step after it is the one that must line up with the
/// currently anticipated maneuver.
fn first_maneuver(route: &SharedRoute) -> Option<&RouteStep> {
    let steps = &route.legs.first()?.steps;
    steps.get(1).or_else(|| steps.first())
}
