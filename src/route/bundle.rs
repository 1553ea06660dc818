//! The route bundle: a main route plus its candidate alternatives.
//!
//! A [`RouteBundle`] is the unit of route replacement. It is replaced, never
//! mutated in place, when the session switches routes; the only in-place
//! update is the fork-passed bookkeeping, which monotonically hides
//! alternatives whose fork point the user has driven past.

use super::alternative::{AlternativeId, AlternativeRoute};
use super::model::{RouteId, SharedRoute, Waypoint};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// A main route with its alternatives and shared trip waypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteBundle {
    /// The route the session navigates on.
    main_route: SharedRoute,
    /// All alternatives, including fork-passed ones kept for bookkeeping.
    alternatives: Vec<AlternativeRoute>,
    /// Waypoints visited along the trip.
    waypoints: Vec<Waypoint>,
    /// Deadline after which incremental annotation refresh is no longer
    /// available for this bundle. `None` disables refresh eligibility.
    refresh_deadline: Option<Instant>,
}

impl RouteBundle {
    /// Create a bundle around a main route with no alternatives.
    pub fn new(main_route: SharedRoute) -> Self {
        let waypoints = main_route.waypoints();
        Self {
            main_route,
            alternatives: Vec::new(),
            waypoints,
            refresh_deadline: None,
        }
    }

    /// Create a bundle with engine-derived alternatives.
    pub fn with_alternatives(main_route: SharedRoute, alternatives: Vec<AlternativeRoute>) -> Self {
        let waypoints = main_route.waypoints();
        Self {
            main_route,
            alternatives,
            waypoints,
            refresh_deadline: None,
        }
    }

    /// Set the annotation-refresh deadline.
    pub fn with_refresh_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.refresh_deadline = deadline;
        self
    }

    /// The current main route.
    pub fn main_route(&self) -> &SharedRoute {
        &self.main_route
    }

    /// Publicly visible alternatives: those whose fork point has not been
    /// passed yet.
    pub fn alternative_routes(&self) -> Vec<&AlternativeRoute> {
        self.alternatives
            .iter()
            .filter(|alt| !alt.is_fork_point_passed)
            .collect()
    }

    /// All alternatives including fork-passed ones.
    pub fn all_alternatives(&self) -> &[AlternativeRoute] {
        &self.alternatives
    }

    /// Trip waypoints.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Annotation-refresh deadline, if refresh is available.
    pub fn refresh_deadline(&self) -> Option<Instant> {
        self.refresh_deadline
    }

    /// Whether the bundle is still eligible for annotation refresh.
    pub fn is_refresh_eligible(&self, now: Instant) -> bool {
        match self.refresh_deadline {
            Some(deadline) => now < deadline,
            None => false,
        }
    }

    /// Replace the alternatives with a freshly derived set.
    ///
    /// Called after the engine acknowledges a route set and reports fork
    /// data relative to the accepted main route.
    pub fn replacing_alternatives(&self, alternatives: Vec<AlternativeRoute>) -> Self {
        Self {
            main_route: Arc::clone(&self.main_route),
            alternatives,
            waypoints: self.waypoints.clone(),
            refresh_deadline: self.refresh_deadline,
        }
    }

    /// Index of an alternative within the *visible* list by route id.
    pub fn visible_index_of(&self, route_id: &RouteId) -> Option<usize> {
        self.alternative_routes()
            .iter()
            .position(|alt| alt.route_id() == route_id)
    }

    /// Build a new bundle with the visible alternative at `index` promoted
    /// to the main route.
    ///
    /// The previous main route and every remaining alternative become
    /// provisional alternatives of the new bundle: their time/distance
    /// deltas are recomputed against the new main, and their fork data is
    /// left for the engine to re-derive when the bundle is activated. Fork
    /// data is never carried across a main-route swap.
    ///
    /// Returns `None` when `index` is out of range of the visible list
    /// (fork-passed alternatives cannot be selected).
    pub fn promoting_alternative(&self, index: usize) -> Option<Self> {
        let visible: Vec<&AlternativeRoute> = self.alternative_routes();
        let chosen = visible.get(index)?;
        let new_main = Arc::clone(&chosen.route);
        let chosen_route_id = chosen.route_id().clone();

        let mut alternatives: Vec<AlternativeRoute> = visible
            .iter()
            .filter(|alt| *alt.route_id() != chosen_route_id)
            .map(|alt| {
                AlternativeRoute::provisional(&new_main, alt.id, Arc::clone(&alt.route))
            })
            .collect();
        // The demoted main route stays selectable. Id 0 is reserved by the
        // engine for the session's primary route, so reuse it here until the
        // engine assigns real ids on activation.
        alternatives.push(AlternativeRoute::provisional(
            &new_main,
            AlternativeId(0),
            Arc::clone(&self.main_route),
        ));

        let waypoints = new_main.waypoints();
        Some(Self {
            main_route: new_main,
            alternatives,
            waypoints,
            refresh_deadline: self.refresh_deadline,
        })
    }

    /// Fold engine-reported fork-passed flags into the bundle.
    ///
    /// The update is monotonic: once an alternative's fork point is passed
    /// it never becomes unpassed within the same bundle. Returns `true`
    /// when the set of passed forks changed, which is the caller's cue to
    /// republish the bundle and an alternatives-updated event.
    pub fn update_fork_points_passed(&mut self, passed: &HashSet<AlternativeId>) -> bool {
        let mut changed = false;
        for alternative in &mut self.alternatives {
            if !alternative.is_fork_point_passed && passed.contains(&alternative.id) {
                alternative.is_fork_point_passed = true;
                changed = true;
            }
        }
        changed
    }

    /// Candidate routes for pushing to the engine: the main route followed
    /// by every visible alternative's route.
    pub fn candidate_routes(&self) -> Vec<SharedRoute> {
        let mut routes = vec![Arc::clone(&self.main_route)];
        routes.extend(
            self.alternative_routes()
                .iter()
                .map(|alt| Arc::clone(&alt.route)),
        );
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::model::test_support::route_with_steps;
    use std::time::Duration;

    fn bundle_with_two_alternatives() -> RouteBundle {
        let main = Arc::new(route_with_steps("main", &["depart", "turn left", "arrive"]));
        let alt_a = Arc::new(route_with_steps("alt-a", &["depart", "arrive"]));
        let alt_b = Arc::new(route_with_steps(
            "alt-b",
            &["depart", "go straight", "turn right", "arrive"],
        ));
        let alternatives = vec![
            AlternativeRoute::provisional(&main, AlternativeId(1), alt_a),
            AlternativeRoute::provisional(&main, AlternativeId(2), alt_b),
        ];
        RouteBundle::with_alternatives(main, alternatives)
    }

    #[test]
    fn test_visible_alternatives_exclude_fork_passed() {
        let mut bundle = bundle_with_two_alternatives();
        assert_eq!(bundle.alternative_routes().len(), 2);

        let passed: HashSet<AlternativeId> = [AlternativeId(1)].into_iter().collect();
        assert!(bundle.update_fork_points_passed(&passed));

        let visible = bundle.alternative_routes();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, AlternativeId(2));
        // Retained internally
        assert_eq!(bundle.all_alternatives().len(), 2);
    }

    #[test]
    fn test_fork_passed_update_is_monotonic() {
        let mut bundle = bundle_with_two_alternatives();
        let passed: HashSet<AlternativeId> = [AlternativeId(1)].into_iter().collect();
        assert!(bundle.update_fork_points_passed(&passed));

        // A later status no longer reporting id 1 must not revert the flag.
        assert!(!bundle.update_fork_points_passed(&HashSet::new()));
        assert!(bundle.all_alternatives()[0].is_fork_point_passed);
    }

    #[test]
    fn test_fork_passed_update_reports_no_change_when_identical() {
        let mut bundle = bundle_with_two_alternatives();
        let passed: HashSet<AlternativeId> = [AlternativeId(2)].into_iter().collect();
        assert!(bundle.update_fork_points_passed(&passed));
        assert!(!bundle.update_fork_points_passed(&passed));
    }

    #[test]
    fn test_promoting_alternative_swaps_main() {
        let bundle = bundle_with_two_alternatives();
        let promoted = bundle.promoting_alternative(0).unwrap();

        assert_eq!(promoted.main_route().id.as_str(), "alt-a");
        // Remaining alternative plus the demoted main
        assert_eq!(promoted.all_alternatives().len(), 2);
        // Fork data never crosses a main-route swap
        assert!(promoted.all_alternatives().iter().all(|a| a.fork.is_none()));
        let ids: Vec<&str> = promoted
            .all_alternatives()
            .iter()
            .map(|a| a.route_id().as_str())
            .collect();
        assert!(ids.contains(&"alt-b"));
        assert!(ids.contains(&"main"));
    }

    #[test]
    fn test_promoting_alternative_out_of_range() {
        let bundle = bundle_with_two_alternatives();
        assert!(bundle.promoting_alternative(5).is_none());
    }

    #[test]
    fn test_promoting_skips_fork_passed_alternatives() {
        let mut bundle = bundle_with_two_alternatives();
        let passed: HashSet<AlternativeId> = [AlternativeId(1)].into_iter().collect();
        bundle.update_fork_points_passed(&passed);

        // Index 0 of the visible list is now alt-b.
        let promoted = bundle.promoting_alternative(0).unwrap();
        assert_eq!(promoted.main_route().id.as_str(), "alt-b");
        // Index 1 no longer exists in the visible list.
        assert!(bundle.promoting_alternative(1).is_none());
    }

    #[test]
    fn test_refresh_eligibility() {
        let main = Arc::new(route_with_steps("main", &["depart", "arrive"]));
        let now = Instant::now();

        let bundle = RouteBundle::new(Arc::clone(&main));
        assert!(!bundle.is_refresh_eligible(now));

        let bundle = RouteBundle::new(main)
            .with_refresh_deadline(Some(now + Duration::from_secs(300)));
        assert!(bundle.is_refresh_eligible(now));
        assert!(!bundle.is_refresh_eligible(now + Duration::from_secs(301)));
    }

    #[test]
    fn test_candidate_routes_main_first() {
        let bundle = bundle_with_two_alternatives();
        let candidates = bundle.candidate_routes();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].id.as_str(), "main");
    }

    #[test]
    fn test_visible_index_of() {
        let bundle = bundle_with_two_alternatives();
        assert_eq!(bundle.visible_index_of(&RouteId::new("alt-b")), Some(1));
        assert_eq!(bundle.visible_index_of(&RouteId::new("nope")), None);
    }
}
