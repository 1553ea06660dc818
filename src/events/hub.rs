//! Typed event fan-out.
//!
//! Every event category gets its own channel instead of a string-keyed
//! broadcast. Current-value categories (session, progress, routes,
//! rerouting, refreshing) use `watch` channels so late subscribers see the
//! latest value immediately; discrete categories (arrivals, errors, faster
//! routes) use `broadcast` channels so no event is coalesced away.

use super::{
    AlternativesStatus, FasterRoutesStatus, MapMatchingState, RefreshingStatus, ReroutingStatus,
    RoutesChanged, Session, WaypointArrival,
};
use crate::engine::{EHorizonEvent, SetRouteReason};
use crate::error::NavigatorError;
use crate::progress::RouteProgress;
use crate::route::RouteBundle;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Buffer depth for discrete event channels. A subscriber this far behind
/// loses the oldest events, signalled by `RecvError::Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Central publication point for every externally visible event stream.
///
/// Single-writer: only the orchestrator publishes. Any number of readers
/// may subscribe; publishing never blocks on slow consumers.
pub struct EventHub {
    session: watch::Sender<Session>,
    progress: watch::Sender<Option<RouteProgress>>,
    routes: watch::Sender<Option<Arc<RouteBundle>>>,
    rerouting: watch::Sender<ReroutingStatus>,
    refreshing: watch::Sender<RefreshingStatus>,
    map_matching: broadcast::Sender<MapMatchingState>,
    routes_changed: broadcast::Sender<RoutesChanged>,
    arrivals: broadcast::Sender<WaypointArrival>,
    alternatives: broadcast::Sender<AlternativesStatus>,
    faster_routes: broadcast::Sender<FasterRoutesStatus>,
    horizon: broadcast::Sender<EHorizonEvent>,
    errors: broadcast::Sender<NavigatorError>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            session: watch::channel(Session::idle()).0,
            progress: watch::channel(None).0,
            routes: watch::channel(None).0,
            rerouting: watch::channel(ReroutingStatus::Idle).0,
            refreshing: watch::channel(RefreshingStatus::Idle).0,
            map_matching: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            routes_changed: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            arrivals: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            alternatives: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            faster_routes: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            horizon: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            errors: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }

    /// Publish a session value, suppressing consecutive duplicates.
    ///
    /// Returns `true` when the value actually changed and was sent.
    pub fn publish_session(&self, session: Session) -> bool {
        self.session.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session;
                true
            }
        })
    }

    /// The most recently published session value.
    pub fn current_session(&self) -> Session {
        *self.session.borrow()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// Publish new route progress, or clear it when returning to idle.
    pub fn publish_progress(&self, progress: Option<RouteProgress>) {
        self.progress.send_replace(progress);
    }

    /// The most recently published progress, if any.
    pub fn current_progress(&self) -> Option<RouteProgress> {
        self.progress.borrow().clone()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Option<RouteProgress>> {
        self.progress.subscribe()
    }

    /// Publish a new active bundle with the reason it replaced the old one.
    ///
    /// The current-value channel is updated before the discrete event is
    /// broadcast, so a subscriber woken by the event always observes the
    /// new bundle. Current values are stored even when nobody subscribes,
    /// since the orchestrator itself reads them back.
    pub fn publish_routes(&self, bundle: Arc<RouteBundle>, reason: SetRouteReason) {
        self.routes.send_replace(Some(bundle.clone()));
        let _ = self.routes_changed.send(RoutesChanged { bundle, reason });
    }

    /// Replace the current bundle without a reason-tagged event. Used when
    /// only derived attributes changed, such as fork-passed flags.
    pub fn replace_current_bundle(&self, bundle: Arc<RouteBundle>) {
        self.routes.send_replace(Some(bundle));
    }

    /// Clear the current bundle when the session returns to idle.
    pub fn clear_routes(&self) {
        self.routes.send_replace(None);
    }

    /// The most recently published bundle, if any.
    pub fn current_bundle(&self) -> Option<Arc<RouteBundle>> {
        self.routes.borrow().clone()
    }

    pub fn subscribe_routes(&self) -> watch::Receiver<Option<Arc<RouteBundle>>> {
        self.routes.subscribe()
    }

    pub fn subscribe_routes_changed(&self) -> broadcast::Receiver<RoutesChanged> {
        self.routes_changed.subscribe()
    }

    pub fn publish_map_matching(&self, state: MapMatchingState) {
        let _ = self.map_matching.send(state);
    }

    pub fn subscribe_map_matching(&self) -> broadcast::Receiver<MapMatchingState> {
        self.map_matching.subscribe()
    }

    pub fn publish_arrival(&self, arrival: WaypointArrival) {
        let _ = self.arrivals.send(arrival);
    }

    pub fn subscribe_arrivals(&self) -> broadcast::Receiver<WaypointArrival> {
        self.arrivals.subscribe()
    }

    pub fn publish_rerouting(&self, status: ReroutingStatus) {
        self.rerouting.send_replace(status);
    }

    pub fn subscribe_rerouting(&self) -> watch::Receiver<ReroutingStatus> {
        self.rerouting.subscribe()
    }

    pub fn publish_alternatives(&self, status: AlternativesStatus) {
        let _ = self.alternatives.send(status);
    }

    pub fn subscribe_alternatives(&self) -> broadcast::Receiver<AlternativesStatus> {
        self.alternatives.subscribe()
    }

    pub fn publish_faster_routes(&self, status: FasterRoutesStatus) {
        let _ = self.faster_routes.send(status);
    }

    pub fn subscribe_faster_routes(&self) -> broadcast::Receiver<FasterRoutesStatus> {
        self.faster_routes.subscribe()
    }

    pub fn publish_refreshing(&self, status: RefreshingStatus) {
        self.refreshing.send_replace(status);
    }

    pub fn subscribe_refreshing(&self) -> watch::Receiver<RefreshingStatus> {
        self.refreshing.subscribe()
    }

    pub fn publish_horizon(&self, event: EHorizonEvent) {
        let _ = self.horizon.send(event);
    }

    pub fn subscribe_horizon(&self) -> broadcast::Receiver<EHorizonEvent> {
        self.horizon.subscribe()
    }

    /// Surface a failure as an advisory event. The last successfully
    /// published session and progress remain authoritative.
    pub fn publish_error(&self, error: NavigatorError) {
        let _ = self.errors.send(error);
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<NavigatorError> {
        self.errors.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ActiveGuidanceState, SessionState};
    use crate::route::test_support::route_with_steps;

    #[test]
    fn test_session_dedup_suppresses_consecutive_duplicates() {
        let hub = EventHub::new();
        let guidance = Session {
            state: SessionState::ActiveGuidance(ActiveGuidanceState::Tracking),
        };

        assert!(hub.publish_session(guidance));
        assert!(!hub.publish_session(guidance));
        assert!(hub.publish_session(Session::idle()));
        assert_eq!(hub.current_session(), Session::idle());
    }

    #[test]
    fn test_initial_session_is_idle() {
        let hub = EventHub::new();
        assert_eq!(hub.current_session(), Session::idle());
        // Publishing idle again is a duplicate of the initial value.
        assert!(!hub.publish_session(Session::idle()));
    }

    #[tokio::test]
    async fn test_routes_visible_before_changed_event() {
        let hub = EventHub::new();
        let mut changed = hub.subscribe_routes_changed();
        let bundle = Arc::new(RouteBundle::new(Arc::new(route_with_steps(
            "route-1",
            &["Depart", "Arrive"],
        ))));

        hub.publish_routes(bundle.clone(), SetRouteReason::NewRoute);

        let event = changed.recv().await.unwrap();
        assert_eq!(event.reason, SetRouteReason::NewRoute);
        // The current-value channel already carries the new bundle.
        let current = hub.current_bundle().unwrap();
        assert_eq!(current.main_route().id, bundle.main_route().id);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = EventHub::new();
        hub.publish_error(NavigatorError::FailedToSetIdle);
        hub.publish_arrival(WaypointArrival::NextLegStarted { leg_index: 1 });
    }

    #[test]
    fn test_current_values_stored_without_subscribers() {
        let hub = EventHub::new();
        let bundle = Arc::new(RouteBundle::new(Arc::new(route_with_steps(
            "route-1",
            &["Depart", "Arrive"],
        ))));

        hub.publish_routes(bundle.clone(), SetRouteReason::NewRoute);
        hub.publish_rerouting(ReroutingStatus::FetchingRoute);

        // Nobody has subscribed, yet the stored values must reflect the
        // publications so the orchestrator can read them back.
        let current = hub.current_bundle().unwrap();
        assert_eq!(current.main_route().id, bundle.main_route().id);
        assert_eq!(*hub.subscribe_rerouting().borrow(), ReroutingStatus::FetchingRoute);

        hub.clear_routes();
        assert!(hub.current_bundle().is_none());
    }

    #[tokio::test]
    async fn test_discrete_arrivals_are_not_coalesced() {
        let hub = EventHub::new();
        let mut arrivals = hub.subscribe_arrivals();

        hub.publish_arrival(WaypointArrival::NextLegStarted { leg_index: 1 });
        hub.publish_arrival(WaypointArrival::NextLegStarted { leg_index: 2 });

        assert_eq!(
            arrivals.recv().await.unwrap(),
            WaypointArrival::NextLegStarted { leg_index: 1 }
        );
        assert_eq!(
            arrivals.recv().await.unwrap(),
            WaypointArrival::NextLegStarted { leg_index: 2 }
        );
    }
}
