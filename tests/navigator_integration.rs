//! Integration tests for the session orchestrator.
//!
//! These tests drive a [`Navigator`] over mock collaborators and verify
//! the complete flows:
//! - Trip lifecycle (idle → free drive / active guidance → idle)
//! - Transactional activation (no partial state on failure)
//! - Status consumption, progress publication and arrival dedup
//! - Reactive reroutes (last reroute wins) and proactive faster routes
//! - Billing begin/pause/resume/stop sequencing
//!
//! Run with: `cargo test --test navigator_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

use navflow::billing::{BillingBackend, BillingError, SessionState, SessionType};
use navflow::config::{FasterRouteConfig, LegAdvanceApproval, LegAdvancePolicy, NavigatorConfig};
use navflow::engine::{
    AlternativeForkStatus, EHorizonConfig, EngineAlternative, EngineError, EngineEvent,
    MatchedLocation, NavEngine, NavigationStatus, RouteState, SetRouteOutcome, SetRouteReason,
};
use navflow::error::NavigatorError;
use navflow::events::{
    ActiveGuidanceState, FasterRoutesStatus, FreeDriveState, ReroutingStatus, Session,
    SessionState as TripSessionState, WaypointArrival,
};
use navflow::geo::LatLon;
use navflow::location::{LocationClient, LocationFix};
use navflow::orchestrator::Navigator;
use navflow::route::{
    AlternativeId, ForkGeometryIndices, ForkInfo, Route, RouteBundle, RouteId, RouteInfo,
    RouteLeg, RouteStep, SharedRoute, Waypoint,
};
use navflow::routing::{RouteRequest, RoutingError, RoutingProvider};

// ============================================================================
// Test Helpers
// ============================================================================

fn make_leg(instructions: &[&str], destination: Option<Waypoint>) -> RouteLeg {
    let steps: Vec<RouteStep> = instructions
        .iter()
        .enumerate()
        .map(|(i, instruction)| RouteStep {
            instruction: (*instruction).to_string(),
            distance: 500.0,
            expected_travel_time: Duration::from_secs(60),
            maneuver_location: LatLon::new(53.5 + i as f64 * 0.001, 10.0),
        })
        .collect();
    RouteLeg {
        distance: steps.iter().map(|s| s.distance).sum(),
        expected_travel_time: steps.iter().map(|s| s.expected_travel_time).sum(),
        steps,
        source: None,
        destination,
    }
}

/// Single-leg route ending at a fixed destination waypoint.
fn make_route(id: &str, instructions: &[&str]) -> Route {
    let destination = Waypoint::named("destination", LatLon::new(53.6, 10.1));
    let leg = make_leg(instructions, Some(destination));
    Route {
        id: RouteId::new(id),
        distance: leg.distance,
        expected_travel_time: leg.expected_travel_time,
        legs: vec![leg],
    }
}

fn make_two_leg_route(id: &str) -> Route {
    let first = make_leg(
        &["Depart", "Arrive at midpoint"],
        Some(Waypoint::named("midpoint", LatLon::new(53.6, 10.1))),
    );
    let second = make_leg(
        &["Depart", "Arrive at end"],
        Some(Waypoint::named("end", LatLon::new(53.7, 10.2))),
    );
    Route {
        id: RouteId::new(id),
        distance: first.distance + second.distance,
        expected_travel_time: first.expected_travel_time + second.expected_travel_time,
        legs: vec![first, second],
    }
}

fn make_status(route_state: RouteState, leg_index: usize, step_index: usize) -> NavigationStatus {
    make_status_with_remaining(route_state, leg_index, step_index, 3000, 120)
}

fn make_status_with_remaining(
    route_state: RouteState,
    leg_index: usize,
    step_index: usize,
    route_secs: u64,
    step_secs: u64,
) -> NavigationStatus {
    NavigationStatus {
        route_state,
        location: MatchedLocation {
            coordinate: LatLon::new(53.55, 10.05),
            bearing: Some(45.0),
            speed: 15.0,
            road_name: Some("Elm Street".to_string()),
        },
        leg_index,
        step_index,
        step_distance_remaining: 400.0,
        step_duration_remaining: Duration::from_secs(step_secs),
        leg_distance_remaining: 900.0,
        leg_duration_remaining: Duration::from_secs(route_secs),
        route_distance_remaining: 900.0,
        route_duration_remaining: Duration::from_secs(route_secs),
        alternatives: Vec::new(),
    }
}

fn fork_info() -> ForkInfo {
    ForkInfo {
        main_route_indices: ForkGeometryIndices {
            leg_index: 0,
            leg_geometry_index: 2,
            route_geometry_index: 2,
        },
        alternative_route_indices: ForkGeometryIndices {
            leg_index: 0,
            leg_geometry_index: 2,
            route_geometry_index: 2,
        },
        info_from_fork: RouteInfo {
            distance: 800.0,
            duration: Duration::from_secs(90),
        },
    }
}

// ============================================================================
// Mock Collaborators
// ============================================================================

struct MockEngine {
    status_tx: broadcast::Sender<NavigationStatus>,
    event_tx: broadcast::Sender<EngineEvent>,
    calls: Mutex<Vec<String>>,
    fail_next_set_route: AtomicBool,
    set_route_delay: Mutex<Duration>,
    outcome_alternatives: Mutex<Vec<EngineAlternative>>,
    update_leg_ok: AtomicBool,
}

impl MockEngine {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            status_tx: broadcast::channel(64).0,
            event_tx: broadcast::channel(64).0,
            calls: Mutex::new(Vec::new()),
            fail_next_set_route: AtomicBool::new(false),
            set_route_delay: Mutex::new(Duration::ZERO),
            outcome_alternatives: Mutex::new(Vec::new()),
            update_leg_ok: AtomicBool::new(true),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn send_status(&self, status: NavigationStatus) {
        let _ = self.status_tx.send(status);
    }

    fn send_event(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[async_trait]
impl NavEngine for MockEngine {
    async fn set_route(
        &self,
        bundle: &RouteBundle,
        leg_index: usize,
        _session_id: Uuid,
        reason: SetRouteReason,
    ) -> Result<SetRouteOutcome, EngineError> {
        let delay = *self.set_route_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record(format!(
            "set_route {} {} leg {}",
            bundle.main_route().id,
            reason,
            leg_index
        ));
        if self.fail_next_set_route.swap(false, Ordering::SeqCst) {
            return Err(EngineError::SetRouteRejected("simulated failure".into()));
        }
        Ok(SetRouteOutcome {
            alternatives: self.outcome_alternatives.lock().unwrap().clone(),
        })
    }

    async fn update_leg(&self, leg_index: usize) -> bool {
        self.record(format!("update_leg {leg_index}"));
        self.update_leg_ok.load(Ordering::SeqCst)
    }

    async fn unset_route(&self, _session_id: Uuid) -> Result<(), EngineError> {
        self.record("unset_route");
        Ok(())
    }

    async fn update_location(&self, _fix: LocationFix) {
        self.record("update_location");
    }

    fn pause(&self) {
        self.record("pause");
    }

    fn resume(&self) {
        self.record("resume");
    }

    fn start_electronic_horizon(&self, _config: EHorizonConfig) {
        self.record("start_electronic_horizon");
    }

    fn stop_electronic_horizon(&self) {
        self.record("stop_electronic_horizon");
    }

    fn subscribe_status(&self) -> broadcast::Receiver<NavigationStatus> {
        self.status_tx.subscribe()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }
}

struct MockRouting {
    responses: Mutex<Vec<SharedRoute>>,
    fail: AtomicBool,
}

impl MockRouting {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    fn set_responses(&self, routes: Vec<SharedRoute>) {
        *self.responses.lock().unwrap() = routes;
    }
}

#[async_trait]
impl RoutingProvider for MockRouting {
    async fn calculate_routes(
        &self,
        _request: RouteRequest,
    ) -> Result<Vec<SharedRoute>, RoutingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RoutingError::Network("simulated outage".into()));
        }
        Ok(self.responses.lock().unwrap().clone())
    }
}

struct RecordingBilling {
    calls: Mutex<Vec<String>>,
    states: Mutex<HashMap<SessionType, SessionState>>,
}

impl RecordingBilling {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            states: Mutex::new(HashMap::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl BillingBackend for RecordingBilling {
    fn begin_session(&self, session_type: SessionType) -> Result<(), BillingError> {
        self.calls.lock().unwrap().push(format!("begin {session_type}"));
        self.states
            .lock()
            .unwrap()
            .insert(session_type, SessionState::Running);
        Ok(())
    }

    fn pause_session(&self, session_type: SessionType) {
        self.calls.lock().unwrap().push(format!("pause {session_type}"));
        self.states
            .lock()
            .unwrap()
            .insert(session_type, SessionState::Paused);
    }

    fn resume_session(&self, session_type: SessionType) -> Result<(), BillingError> {
        self.calls.lock().unwrap().push(format!("resume {session_type}"));
        self.states
            .lock()
            .unwrap()
            .insert(session_type, SessionState::Running);
        Ok(())
    }

    fn stop_session(&self, session_type: SessionType) {
        self.calls.lock().unwrap().push(format!("stop {session_type}"));
        self.states
            .lock()
            .unwrap()
            .insert(session_type, SessionState::Stopped);
    }

    fn session_status(&self, session_type: SessionType) -> SessionState {
        self.states
            .lock()
            .unwrap()
            .get(&session_type)
            .copied()
            .unwrap_or(SessionState::Stopped)
    }
}

struct MockLocation {
    fix_tx: broadcast::Sender<LocationFix>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockLocation {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fix_tx: broadcast::channel(64).0,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    fn send_fix(&self) {
        let _ = self.fix_tx.send(LocationFix {
            coordinate: LatLon::new(53.55, 10.05),
            bearing: Some(45.0),
            heading: Some(45.0),
            speed: 15.0,
            timestamp: Instant::now(),
        });
    }
}

impl LocationClient for MockLocation {
    fn start_updates(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop_updates(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<LocationFix> {
        self.fix_tx.subscribe()
    }
}

struct Harness {
    navigator: Navigator,
    engine: Arc<MockEngine>,
    routing: Arc<MockRouting>,
    billing: Arc<RecordingBilling>,
    location: Arc<MockLocation>,
}

fn start_navigator(config: NavigatorConfig) -> Harness {
    let engine = MockEngine::new();
    let routing = MockRouting::new();
    let billing = RecordingBilling::new();
    let location = MockLocation::new();
    let navigator = Navigator::start(
        engine.clone(),
        routing.clone(),
        billing.clone(),
        location.clone(),
        config,
    );
    Harness {
        navigator,
        engine,
        routing,
        billing,
        location,
    }
}

const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_activation_publishes_session_then_progress() {
    let harness = start_navigator(NavigatorConfig::default());
    let mut routes_changed = harness.navigator.events().subscribe_routes_changed();

    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    assert_eq!(
        harness.navigator.events().current_session(),
        Session {
            state: TripSessionState::ActiveGuidance(ActiveGuidanceState::Initialized)
        }
    );

    let changed = timeout(WAIT, routes_changed.recv()).await.unwrap().unwrap();
    assert_eq!(changed.reason, SetRouteReason::NewRoute);
    assert_eq!(changed.bundle.main_route().id.as_str(), "route-a");

    let progress = harness.navigator.events().current_progress().unwrap();
    assert_eq!(progress.leg_index(), 0);
    assert_eq!(progress.bundle().main_route().id.as_str(), "route-a");

    assert_eq!(harness.billing.calls(), vec!["begin Active Guidance"]);
    assert_eq!(harness.location.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_activation_leaves_no_partial_state() {
    let harness = start_navigator(NavigatorConfig::default());
    let mut errors = harness.navigator.events().subscribe_errors();
    harness.engine.fail_next_set_route.store(true, Ordering::SeqCst);

    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    let result = harness.navigator.start_active_guidance(bundle, 0).await;

    assert!(matches!(
        result,
        Err(NavigatorError::FailedToSetRoute { .. })
    ));
    assert_eq!(harness.navigator.events().current_session(), Session::idle());
    assert!(harness.navigator.events().current_bundle().is_none());
    assert!(harness.navigator.events().current_progress().is_none());

    let error = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(matches!(error, NavigatorError::FailedToSetRoute { .. }));

    // The tentative billing session was rolled back.
    assert_eq!(
        harness.billing.calls(),
        vec!["begin Active Guidance", "stop Active Guidance"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_start_leg_is_rejected() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));

    let result = harness.navigator.start_active_guidance(bundle, 3).await;

    assert!(matches!(
        result,
        Err(NavigatorError::FailedToSetRoute { .. })
    ));
    // The engine was never consulted.
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_to_idle_twice_stops_billing_once() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    harness.navigator.set_to_idle().await.unwrap();
    harness.navigator.set_to_idle().await.unwrap();

    let stops = harness
        .billing
        .calls()
        .iter()
        .filter(|call| call.as_str() == "stop Active Guidance")
        .count();
    assert_eq!(stops, 1);
    assert_eq!(harness.navigator.events().current_session(), Session::idle());
    assert!(harness.navigator.events().current_bundle().is_none());
    assert!(harness.navigator.events().current_progress().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_free_drive_pause_resume_billing_sequence() {
    let harness = start_navigator(NavigatorConfig::default());

    harness.navigator.start_free_drive().await.unwrap();
    harness.navigator.pause_free_drive().await.unwrap();
    harness.navigator.start_free_drive().await.unwrap();

    assert_eq!(
        harness.billing.calls(),
        vec!["begin Free Drive", "pause Free Drive", "resume Free Drive"]
    );
    assert_eq!(
        harness.navigator.events().current_session().state,
        TripSessionState::FreeDrive(FreeDriveState::Active)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pause_outside_free_drive_fails() {
    let harness = start_navigator(NavigatorConfig::default());
    let result = harness.navigator.pause_free_drive().await;
    assert!(matches!(result, Err(NavigatorError::FailedToPause)));
    assert_eq!(harness.navigator.events().current_session(), Session::idle());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_guidance_to_free_drive_switches_billing_type() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    harness.navigator.start_free_drive().await.unwrap();

    assert_eq!(
        harness.billing.calls(),
        vec![
            "begin Active Guidance",
            "stop Active Guidance",
            "begin Free Drive"
        ]
    );
    assert!(harness.navigator.events().current_bundle().is_none());
}

// ============================================================================
// Status consumption
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_status_while_idle_is_an_unexpected_status() {
    let harness = start_navigator(NavigatorConfig::default());
    let mut errors = harness.navigator.events().subscribe_errors();

    harness
        .engine
        .send_status(make_status(RouteState::Tracking, 0, 0));

    let error = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert_eq!(error, NavigatorError::UnexpectedStatus);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_updates_session_and_progress() {
    let harness = start_navigator(NavigatorConfig::default());
    let mut matching = harness.navigator.events().subscribe_map_matching();
    let bundle = RouteBundle::new(Arc::new(make_route(
        "route-a",
        &["Depart", "Turn left onto Elm", "Arrive"],
    )));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    harness
        .engine
        .send_status(make_status(RouteState::Tracking, 0, 1));

    let matched = timeout(WAIT, matching.recv()).await.unwrap().unwrap();
    assert!(!matched.off_road);
    assert_eq!(matched.location.road_name.as_deref(), Some("Elm Street"));

    assert_eq!(
        harness.navigator.events().current_session().state,
        TripSessionState::ActiveGuidance(ActiveGuidanceState::Tracking)
    );
    let progress = harness.navigator.events().current_progress().unwrap();
    assert_eq!(progress.step_index(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_location_fixes_forwarded_only_while_running() {
    let harness = start_navigator(NavigatorConfig::default());

    // Idle: fixes are not forwarded.
    harness.location.send_fix();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!harness.engine.calls().contains(&"update_location".to_string()));

    harness.navigator.start_free_drive().await.unwrap();
    harness.location.send_fix();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(harness.engine.calls().contains(&"update_location".to_string()));
}

// ============================================================================
// Arrival
// ============================================================================

struct DeclineAdvance;

#[async_trait]
impl LegAdvanceApproval for DeclineAdvance {
    async fn should_advance(&self, _waypoint: &Waypoint, _next_leg_index: usize) -> bool {
        false
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_arrival_fires_once_under_repeated_complete_ticks() {
    let config = NavigatorConfig {
        leg_advance: LegAdvancePolicy::Manually(Arc::new(DeclineAdvance)),
        ..NavigatorConfig::default()
    };
    let harness = start_navigator(config);
    let mut arrivals = harness.navigator.events().subscribe_arrivals();

    let bundle = RouteBundle::new(Arc::new(make_two_leg_route("route-a")));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    // The user lingers at the midpoint; the engine keeps reporting Complete.
    harness.engine.send_status(make_status(RouteState::Complete, 0, 1));
    let first = timeout(WAIT, arrivals.recv()).await.unwrap().unwrap();
    match first {
        WaypointArrival::ToWaypoint {
            leg_index,
            waypoint,
        } => {
            assert_eq!(leg_index, 0);
            assert_eq!(waypoint.name.as_deref(), Some("midpoint"));
        }
        other => panic!("expected waypoint arrival, got {other:?}"),
    }

    harness.engine.send_status(make_status(RouteState::Complete, 0, 1));
    harness.engine.send_status(make_status(RouteState::Complete, 0, 1));
    let second = timeout(Duration::from_millis(300), arrivals.recv()).await;
    assert!(second.is_err(), "arrival must not re-fire: {second:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_automatic_leg_advance_bills_new_leg() {
    let harness = start_navigator(NavigatorConfig::default());
    let mut arrivals = harness.navigator.events().subscribe_arrivals();

    let bundle = RouteBundle::new(Arc::new(make_two_leg_route("route-a")));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    harness.engine.send_status(make_status(RouteState::Complete, 0, 1));

    let first = timeout(WAIT, arrivals.recv()).await.unwrap().unwrap();
    assert!(matches!(first, WaypointArrival::ToWaypoint { leg_index: 0, .. }));
    let second = timeout(WAIT, arrivals.recv()).await.unwrap().unwrap();
    assert_eq!(second, WaypointArrival::NextLegStarted { leg_index: 1 });

    assert!(harness.engine.calls().contains(&"update_leg 1".to_string()));
    // Per-leg billing: a fresh backend trip under the same session.
    let begins = harness
        .billing
        .calls()
        .iter()
        .filter(|call| call.as_str() == "begin Active Guidance")
        .count();
    assert_eq!(begins, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_final_destination_arrival() {
    let config = NavigatorConfig {
        leg_advance: LegAdvancePolicy::Manually(Arc::new(DeclineAdvance)),
        ..NavigatorConfig::default()
    };
    let harness = start_navigator(config);
    let mut arrivals = harness.navigator.events().subscribe_arrivals();

    let bundle = RouteBundle::new(Arc::new(make_two_leg_route("route-a")));
    harness
        .navigator
        .start_active_guidance(bundle, 1)
        .await
        .unwrap();

    harness.engine.send_status(make_status(RouteState::Complete, 1, 1));

    let arrival = timeout(WAIT, arrivals.recv()).await.unwrap().unwrap();
    match arrival {
        WaypointArrival::ToFinalDestination { waypoint } => {
            assert_eq!(waypoint.name.as_deref(), Some("end"));
        }
        other => panic!("expected final destination arrival, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_switch_leg_outside_guidance_fails() {
    let harness = start_navigator(NavigatorConfig::default());
    let result = harness.navigator.switch_leg(1).await;
    assert!(matches!(result, Err(NavigatorError::FailedToSelectRouteLeg)));
}

// ============================================================================
// Alternatives
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_select_out_of_range_alternative_fails_without_side_effects() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();
    let session_before = harness.navigator.events().current_session();

    let result = harness.navigator.select_alternative(5).await;

    assert!(matches!(
        result,
        Err(NavigatorError::FailedToSelectAlternativeRoute)
    ));
    assert_eq!(harness.navigator.events().current_session(), session_before);
    assert_eq!(
        harness
            .navigator
            .events()
            .current_bundle()
            .unwrap()
            .main_route()
            .id
            .as_str(),
        "route-a"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_select_alternative_promotes_it_to_main() {
    let harness = start_navigator(NavigatorConfig::default());
    let alternative_route: SharedRoute =
        Arc::new(make_route("route-b", &["Depart", "Keep right", "Arrive"]));
    harness.engine.outcome_alternatives.lock().unwrap().push(EngineAlternative {
        id: AlternativeId(1),
        route: alternative_route,
        fork: fork_info(),
    });

    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    let mut routes_changed = harness.navigator.events().subscribe_routes_changed();
    harness.navigator.select_alternative(0).await.unwrap();

    let changed = timeout(WAIT, routes_changed.recv()).await.unwrap().unwrap();
    assert_eq!(changed.reason, SetRouteReason::Alternatives);
    assert_eq!(changed.bundle.main_route().id.as_str(), "route-b");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fork_passed_flag_is_monotonic_and_hides_alternative() {
    let harness = start_navigator(NavigatorConfig::default());
    let alternative_route: SharedRoute =
        Arc::new(make_route("route-b", &["Depart", "Keep right", "Arrive"]));
    harness.engine.outcome_alternatives.lock().unwrap().push(EngineAlternative {
        id: AlternativeId(7),
        route: alternative_route,
        fork: fork_info(),
    });

    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();
    assert_eq!(
        harness
            .navigator
            .events()
            .current_bundle()
            .unwrap()
            .alternative_routes()
            .len(),
        1
    );

    let mut alternatives = harness.navigator.events().subscribe_alternatives();

    let mut passed = make_status(RouteState::Tracking, 0, 0);
    passed.alternatives = vec![AlternativeForkStatus {
        id: AlternativeId(7),
        is_fork_point_passed: true,
    }];
    harness.engine.send_status(passed);

    let update = timeout(WAIT, alternatives.recv()).await.unwrap().unwrap();
    match update {
        navflow::events::AlternativesStatus::Updated { alternatives } => {
            assert!(alternatives.is_empty(), "passed fork must hide alternative");
        }
        other => panic!("expected alternatives update, got {other:?}"),
    }

    // A later tick reporting the fork as unpassed must not resurrect it.
    let mut unpassed = make_status(RouteState::Tracking, 0, 0);
    unpassed.alternatives = vec![AlternativeForkStatus {
        id: AlternativeId(7),
        is_fork_point_passed: false,
    }];
    harness.engine.send_status(unpassed);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let bundle = harness.navigator.events().current_bundle().unwrap();
    assert!(bundle.alternative_routes().is_empty());
    assert!(bundle.all_alternatives()[0].is_fork_point_passed);
}

// ============================================================================
// Rerouting
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_reactive_reroute_activates_new_route() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    let mut rerouting = harness.navigator.events().subscribe_rerouting();
    let mut routes_changed = harness.navigator.events().subscribe_routes_changed();

    harness.engine.send_event(EngineEvent::RerouteDetected);
    timeout(WAIT, rerouting.changed()).await.unwrap().unwrap();
    assert_eq!(*rerouting.borrow(), ReroutingStatus::FetchingRoute);

    let reroute: SharedRoute = Arc::new(make_route("route-r", &["Depart", "Arrive"]));
    harness.engine.send_event(EngineEvent::RerouteReceived {
        main_route: reroute,
        alternatives: Vec::new(),
    });

    let changed = timeout(WAIT, routes_changed.recv()).await.unwrap().unwrap();
    assert_eq!(changed.reason, SetRouteReason::Reroute);
    assert_eq!(changed.bundle.main_route().id.as_str(), "route-r");

    timeout(WAIT, rerouting.changed()).await.unwrap().unwrap();
    assert_eq!(*rerouting.borrow(), ReroutingStatus::Idle);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_back_to_back_reroutes_publish_only_the_newest() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    let mut routes_changed = harness.navigator.events().subscribe_routes_changed();
    // Slow the engine down so the second reroute lands while the first
    // activation is still in flight.
    *harness.engine.set_route_delay.lock().unwrap() = Duration::from_millis(100);

    let first: SharedRoute = Arc::new(make_route("route-b", &["Depart", "Arrive"]));
    let second: SharedRoute = Arc::new(make_route("route-c", &["Depart", "Arrive"]));
    harness.engine.send_event(EngineEvent::RerouteReceived {
        main_route: first,
        alternatives: Vec::new(),
    });
    harness.engine.send_event(EngineEvent::RerouteReceived {
        main_route: second,
        alternatives: Vec::new(),
    });

    let changed = timeout(WAIT, routes_changed.recv()).await.unwrap().unwrap();
    assert_eq!(changed.bundle.main_route().id.as_str(), "route-c");

    // The superseded reroute never publishes.
    let extra = timeout(Duration::from_millis(300), routes_changed.recv()).await;
    assert!(extra.is_err(), "only the newest reroute may publish: {extra:?}");
    assert_eq!(
        harness
            .navigator
            .events()
            .current_bundle()
            .unwrap()
            .main_route()
            .id
            .as_str(),
        "route-c"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reroute_failure_is_surfaced() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route("route-a", &["Depart", "Arrive"])));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    let mut rerouting = harness.navigator.events().subscribe_rerouting();
    let mut errors = harness.navigator.events().subscribe_errors();

    harness.engine.send_event(EngineEvent::RerouteFailed {
        reason: "no network".into(),
    });

    timeout(WAIT, rerouting.changed()).await.unwrap().unwrap();
    assert_eq!(
        *rerouting.borrow(),
        ReroutingStatus::Failed {
            message: "no network".into()
        }
    );
    let error = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(matches!(error, NavigatorError::InterruptedReroute { .. }));
}

// ============================================================================
// Faster routes
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_faster_route_detected_and_applied() {
    let config = NavigatorConfig {
        faster_route: FasterRouteConfig {
            check_interval: Duration::from_secs(90),
            ..FasterRouteConfig::default()
        },
        ..NavigatorConfig::default()
    };
    let harness = start_navigator(config);

    let bundle = RouteBundle::new(Arc::new(make_route(
        "route-a",
        &["Depart", "Turn left onto Elm", "Continue straight", "Arrive"],
    )));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    // 2600s beats 90% of the 3000s remaining, keeps the upcoming maneuver
    // and leaves enough time before its own first turn.
    let mut candidate = make_route("route-f", &["Depart", "Turn left onto Elm", "Arrive"]);
    candidate.expected_travel_time = Duration::from_secs(2600);
    candidate.legs[0].steps[0].expected_travel_time = Duration::from_secs(90);
    harness.routing.set_responses(vec![Arc::new(candidate)]);

    let mut faster = harness.navigator.events().subscribe_faster_routes();
    let mut routes_changed = harness.navigator.events().subscribe_routes_changed();

    harness
        .engine
        .send_status(make_status_with_remaining(RouteState::Tracking, 0, 0, 3000, 120));

    let detected = timeout(WAIT, faster.recv()).await.unwrap().unwrap();
    match detected {
        FasterRoutesStatus::Detected { route } => assert_eq!(route.id.as_str(), "route-f"),
        other => panic!("expected detection, got {other:?}"),
    }
    let applied = timeout(WAIT, faster.recv()).await.unwrap().unwrap();
    match applied {
        FasterRoutesStatus::Applied { route_id } => assert_eq!(route_id.as_str(), "route-f"),
        other => panic!("expected application, got {other:?}"),
    }

    let changed = timeout(WAIT, routes_changed.recv()).await.unwrap().unwrap();
    assert_eq!(changed.reason, SetRouteReason::FasterRoute);
    assert_eq!(changed.bundle.main_route().id.as_str(), "route-f");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slower_candidate_is_not_applied() {
    let harness = start_navigator(NavigatorConfig::default());
    let bundle = RouteBundle::new(Arc::new(make_route(
        "route-a",
        &["Depart", "Turn left onto Elm", "Arrive"],
    )));
    harness
        .navigator
        .start_active_guidance(bundle, 0)
        .await
        .unwrap();

    let mut candidate = make_route("route-f", &["Depart", "Turn left onto Elm", "Arrive"]);
    candidate.expected_travel_time = Duration::from_secs(2900);
    harness.routing.set_responses(vec![Arc::new(candidate)]);

    let mut faster = harness.navigator.events().subscribe_faster_routes();
    harness
        .engine
        .send_status(make_status_with_remaining(RouteState::Tracking, 0, 0, 3000, 120));

    let status = timeout(WAIT, faster.recv()).await.unwrap().unwrap();
    assert!(matches!(status, FasterRoutesStatus::NoFasterRoute));
    assert_eq!(
        harness
            .navigator
            .events()
            .current_bundle()
            .unwrap()
            .main_route()
            .id
            .as_str(),
        "route-a"
    );
}
