//! Navigator construction and session lifecycle operations.

use crate::billing::{BillingBackend, BillingHandler, SessionType};
use crate::config::NavigatorConfig;
use crate::engine::{NavEngine, SetRouteReason};
use crate::error::NavigatorError;
use crate::events::{
    ActiveGuidanceState, EventHub, FreeDriveState, Session, SessionState,
};
use crate::location::LocationClient;
use crate::progress::{ArrivalTracker, RouteProgress};
use crate::route::{AlternativeRoute, RouteBundle, Waypoint};
use crate::routing::{FasterRouteMonitor, RoutingProvider};
use crate::tasks::TaskManager;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Mutable trip state, guarded by a single mutex.
///
/// Only touched inside barrier- or task-protected critical sections; the
/// mutex exists for the few cross-cutting readers (status ticks, billing
/// checks). Never held across an await.
pub(super) struct TripState {
    /// Billing session UUID of the current trip, if one is running.
    pub(super) session_id: Option<Uuid>,
    /// The main route the current billing session was billed against.
    pub(super) billed_route: Option<crate::route::SharedRoute>,
    /// Leg currently being traveled.
    pub(super) current_leg: usize,
    /// Monotonic counter for reactive reroutes; stale activations bail.
    pub(super) reroute_generation: u64,
    /// Whether a reactive reroute is between detection and resolution.
    pub(super) reroute_in_flight: bool,
    /// Exactly-once arrival dedup.
    pub(super) arrival: ArrivalTracker,
    /// Proactive faster-route gating.
    pub(super) faster: FasterRouteMonitor,
}

pub(super) struct Inner {
    pub(super) config: NavigatorConfig,
    pub(super) engine: Arc<dyn NavEngine>,
    pub(super) routing: Arc<dyn RoutingProvider>,
    pub(super) billing: BillingHandler,
    pub(super) location: Arc<dyn LocationClient>,
    pub(super) events: EventHub,
    pub(super) tasks: TaskManager,
    pub(super) state: Mutex<TripState>,
    pub(super) shutdown: CancellationToken,
}

/// Guard evaluated under the barrier before an activation may proceed or
/// publish. Lets a superseded reroute or faster-route activation abort
/// without leaving partial state.
pub(super) type ActivationGuard = Box<dyn Fn(&TripState) -> bool + Send + Sync>;

/// The session orchestrator.
///
/// Owns the trip state machine (idle, free drive, active guidance),
/// consumes the engine's status and event streams, and publishes session
/// state, route progress and discrete events through its [`EventHub`].
/// Constructed once per trip-capable process; cloning shares the instance.
#[derive(Clone)]
pub struct Navigator {
    pub(super) inner: Arc<Inner>,
}

impl Navigator {
    /// Build a navigator over its collaborators and start its background
    /// loops (status consumption, engine events, location forwarding).
    pub fn start(
        engine: Arc<dyn NavEngine>,
        routing: Arc<dyn RoutingProvider>,
        billing: Arc<dyn BillingBackend>,
        location: Arc<dyn LocationClient>,
        config: NavigatorConfig,
    ) -> Self {
        let faster = FasterRouteMonitor::new(config.faster_route.clone());
        let navigator = Self {
            inner: Arc::new(Inner {
                config,
                engine,
                routing,
                billing: BillingHandler::new(billing),
                location,
                events: EventHub::new(),
                tasks: TaskManager::new(),
                state: Mutex::new(TripState {
                    session_id: None,
                    billed_route: None,
                    current_leg: 0,
                    reroute_generation: 0,
                    reroute_in_flight: false,
                    arrival: ArrivalTracker::new(),
                    faster,
                }),
                shutdown: CancellationToken::new(),
            }),
        };
        navigator.spawn_status_loop();
        navigator.spawn_engine_event_loop();
        navigator.spawn_location_loop();
        navigator
    }

    /// Event streams published by this navigator.
    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    /// Stop the background loops and cancel in-flight tasks. The instance
    /// stays usable for reads but processes no further updates.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.cancel_tasks();
    }

    pub(super) fn lock_state(&self) -> MutexGuard<'_, TripState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin active guidance along `bundle`, starting at `start_leg_index`.
    ///
    /// On success publishes the session state
    /// (`ActiveGuidance(Initialized)`), the bundle (reason `NewRoute`) and
    /// initial progress, in that order. On failure nothing previously
    /// published changes.
    pub async fn start_active_guidance(
        &self,
        bundle: RouteBundle,
        start_leg_index: usize,
    ) -> Result<(), NavigatorError> {
        if start_leg_index >= bundle.main_route().legs.len() {
            let error = NavigatorError::FailedToSetRoute {
                cause: Some(format!("leg index {start_leg_index} out of range")),
            };
            self.inner.events.publish_error(error.clone());
            return Err(error);
        }
        self.activate(Arc::new(bundle), start_leg_index, SetRouteReason::NewRoute, None)
            .await
    }

    /// Return to idle: stop location updates, unset the engine route, stop
    /// billing and clear progress. Calling this while already idle is a
    /// no-op apart from a logged warning.
    pub async fn set_to_idle(&self) -> Result<(), NavigatorError> {
        self.inner
            .tasks
            .with_barrier(|| async {
                if self.inner.events.current_session() == Session::idle() {
                    warn!("set_to_idle called while already idle");
                    return Ok(());
                }

                self.inner.location.stop_updates();
                self.inner.engine.stop_electronic_horizon();

                let session_id = {
                    let mut state = self.lock_state();
                    state.billed_route = None;
                    state.current_leg = 0;
                    state.reroute_in_flight = false;
                    state.reroute_generation += 1;
                    state.arrival.reset();
                    state.faster.invalidate();
                    state.session_id.take()
                };

                if let Some(uuid) = session_id {
                    if self.inner.billing.session_type(uuid) == Some(SessionType::ActiveGuidance) {
                        if let Err(e) = self.inner.engine.unset_route(uuid).await {
                            warn!(error = %e, "engine failed to unset route while idling");
                            self.inner.events.publish_error(NavigatorError::FailedToSetIdle);
                        }
                    }
                    self.inner.billing.stop_billing_session(uuid);
                }

                self.inner.engine.pause();
                self.inner.events.publish_progress(None);
                self.inner.events.clear_routes();
                self.inner.events.publish_session(Session::idle());
                info!("session idled");
                Ok(())
            })
            .await
    }

    /// Enter free drive, or resume it when currently paused.
    ///
    /// From active guidance this tears the route down first; the billing
    /// session switches type, which always stops the old session.
    pub async fn start_free_drive(&self) -> Result<(), NavigatorError> {
        self.inner
            .tasks
            .with_barrier(|| async {
                let session = self.inner.events.current_session();
                if session.state == SessionState::FreeDrive(FreeDriveState::Active) {
                    debug!("already in active free drive");
                    return Ok(());
                }

                // Resuming a paused free drive keeps the billing UUID so
                // the backend resumes instead of billing a fresh session.
                if session.state == SessionState::FreeDrive(FreeDriveState::Paused) {
                    let session_id = self.lock_state().session_id;
                    if let Some(uuid) = session_id {
                        self.inner.billing.resume_billing_session(uuid);
                        self.inner.location.start_updates();
                        self.inner.engine.resume();
                        self.inner.events.publish_session(Session {
                            state: SessionState::FreeDrive(FreeDriveState::Active),
                        });
                        info!("free drive resumed");
                        return Ok(());
                    }
                }

                if session.state.is_active_guidance() {
                    let session_id = self.lock_state().session_id;
                    if let Some(uuid) = session_id {
                        if let Err(e) = self.inner.engine.unset_route(uuid).await {
                            warn!(error = %e, "engine failed to unset route when leaving guidance");
                        }
                        self.inner.billing.stop_billing_session(uuid);
                    }
                    self.inner.engine.stop_electronic_horizon();
                    self.inner.events.publish_progress(None);
                    self.inner.events.clear_routes();
                }

                let uuid = Uuid::new_v4();
                {
                    let mut state = self.lock_state();
                    state.session_id = Some(uuid);
                    state.billed_route = None;
                    state.current_leg = 0;
                    state.arrival.reset();
                    state.faster.invalidate();
                    state.reroute_in_flight = false;
                }
                self.inner.billing.begin_billing_session(SessionType::FreeDrive, uuid);
                self.inner.location.start_updates();
                self.inner.engine.resume();
                self.inner.events.publish_session(Session {
                    state: SessionState::FreeDrive(FreeDriveState::Active),
                });
                info!(%uuid, "free drive started");
                Ok(())
            })
            .await
    }

    /// Pause free drive: stop location updates and the engine, pause
    /// billing, keep the session UUID for a cheap resume.
    pub async fn pause_free_drive(&self) -> Result<(), NavigatorError> {
        self.inner
            .tasks
            .with_barrier(|| async {
                let session = self.inner.events.current_session();
                if session.state != SessionState::FreeDrive(FreeDriveState::Active) {
                    let error = NavigatorError::FailedToPause;
                    warn!(state = %session.state, "pause requested outside active free drive");
                    self.inner.events.publish_error(error.clone());
                    return Err(error);
                }

                let session_id = self.lock_state().session_id;
                if let Some(uuid) = session_id {
                    self.inner.billing.pause_billing_session(uuid);
                }
                self.inner.location.stop_updates();
                self.inner.engine.pause();
                self.inner.events.publish_session(Session {
                    state: SessionState::FreeDrive(FreeDriveState::Paused),
                });
                info!("free drive paused");
                Ok(())
            })
            .await
    }

    /// Replace the active route set under the barrier.
    ///
    /// The engine call and billing assertion happen inside the barrier;
    /// every publication happens only after the engine acknowledged, so a
    /// failed or superseded activation leaves previously published values
    /// bit-for-bit unchanged.
    pub(super) async fn activate(
        &self,
        bundle: Arc<RouteBundle>,
        leg_index: usize,
        reason: SetRouteReason,
        guard: Option<ActivationGuard>,
    ) -> Result<(), NavigatorError> {
        self.inner
            .tasks
            .with_barrier(|| async {
                if let Some(guard) = &guard {
                    if !guard(&self.lock_state()) {
                        debug!(%reason, "activation superseded before engine call");
                        return Err(NavigatorError::InterruptedReroute { cause: None });
                    }
                }

                let (previous_id, billed_route) = {
                    let state = self.lock_state();
                    (state.session_id, state.billed_route.clone())
                };
                let previous_type = previous_id.and_then(|uuid| self.inner.billing.session_type(uuid));

                let reuse_session = match (previous_id, previous_type, billed_route.as_ref()) {
                    (Some(_), Some(SessionType::ActiveGuidance), Some(billed)) => {
                        let remaining: Vec<Waypoint> = self
                            .inner
                            .events
                            .current_progress()
                            .map(|p| p.remaining_waypoints())
                            .unwrap_or_else(|| billed.leg_destinations());
                        !self.inner.billing.should_start_new_billing_session(
                            bundle.main_route(),
                            billed,
                            &remaining,
                        )
                    }
                    _ => false,
                };

                let (session_id, created_new) = match (reuse_session, previous_id) {
                    (true, Some(uuid)) => (uuid, false),
                    _ => (Uuid::new_v4(), true),
                };
                if created_new {
                    if let Some(old) = previous_id {
                        self.inner.billing.stop_billing_session(old);
                    }
                    self.inner
                        .billing
                        .begin_billing_session(SessionType::ActiveGuidance, session_id);
                } else {
                    self.inner.billing.resume_billing_session(session_id);
                }

                let outcome = match self
                    .inner
                    .engine
                    .set_route(&bundle, leg_index, session_id, reason)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        // Roll billing back so a failed activation leaves no trace.
                        if created_new {
                            self.inner.billing.stop_billing_session(session_id);
                            if let (Some(old), Some(old_type)) = (previous_id, previous_type) {
                                self.inner.billing.begin_billing_session(old_type, old);
                            }
                        }
                        let error = NavigatorError::FailedToSetRoute {
                            cause: Some(e.to_string()),
                        };
                        warn!(%reason, error = %e, "engine rejected route activation");
                        self.inner.events.publish_error(error.clone());
                        return Err(error);
                    }
                };

                if let Some(guard) = &guard {
                    // A newer activation queued behind this barrier takes
                    // over; publish nothing.
                    if !guard(&self.lock_state()) {
                        debug!(%reason, "activation superseded after engine call");
                        return Err(NavigatorError::InterruptedReroute { cause: None });
                    }
                }

                // Alternatives come back re-derived relative to the main
                // route the engine actually accepted.
                let main = bundle.main_route().clone();
                let alternatives: Vec<AlternativeRoute> = outcome
                    .alternatives
                    .iter()
                    .map(|alt| {
                        AlternativeRoute::relative_to(&main, alt.id, alt.route.clone(), alt.fork)
                    })
                    .collect();
                let accepted = Arc::new(bundle.replacing_alternatives(alternatives));

                {
                    let mut state = self.lock_state();
                    state.session_id = Some(session_id);
                    state.billed_route = Some(main);
                    state.current_leg = leg_index;
                    state.reroute_in_flight = false;
                    state.arrival.reset();
                    state.faster.invalidate();
                }

                self.inner.location.start_updates();
                if let Some(horizon) = self.inner.config.electronic_horizon {
                    self.inner.engine.start_electronic_horizon(horizon);
                }
                self.inner.engine.resume();

                self.inner.events.publish_session(Session {
                    state: SessionState::ActiveGuidance(ActiveGuidanceState::Initialized),
                });
                let route_id = accepted.main_route().id.clone();
                self.inner.events.publish_routes(accepted.clone(), reason);
                self.inner
                    .events
                    .publish_progress(Some(RouteProgress::initial(accepted, leg_index)));
                info!(route = %route_id, %reason, leg = leg_index, "route activated");
                Ok(())
            })
            .await
    }

    fn spawn_location_loop(&self) {
        let navigator = self.clone();
        let mut fixes = self.inner.location.subscribe();
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let fix = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    received = fixes.recv() => match received {
                        Ok(fix) => fix,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "location fixes dropped under load");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                };
                if navigator
                    .inner
                    .events
                    .current_session()
                    .state
                    .wants_location_updates()
                {
                    navigator.inner.engine.update_location(fix).await;
                }
            }
        });
    }
}
