//! Status-tick handling and in-guidance operations.

use super::navigator::Navigator;
use crate::billing::SessionState as BillingState;
use crate::config::{FasterRouteApprovalPolicy, LegAdvancePolicy};
use crate::engine::{NavigationStatus, RouteState, SetRouteReason};
use crate::error::NavigatorError;
use crate::events::{
    AlternativesStatus, FasterRoutesStatus, MapMatchingState, Session, SessionState,
    WaypointArrival,
};
use crate::progress::{ArrivalEvent, RouteProgress};
use crate::route::{RouteBundle, RouteId};
use crate::routing::RouteRequest;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

impl Navigator {
    /// Consume the engine's status stream.
    ///
    /// One tick is in flight at a time: each is dispatched as a cancellable
    /// unit, and queued backlog is drained so only the newest tick is
    /// handled. Statuses are derivable from the latest fix alone, so
    /// dropping intermediates loses nothing.
    pub(super) fn spawn_status_loop(&self) {
        let navigator = self.clone();
        let mut statuses = self.inner.engine.subscribe_status();
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let status = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    received = statuses.recv() => match received {
                        Ok(status) => status,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "status ticks dropped under load");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                };
                let status = drain_to_latest(&mut statuses, status);
                let handler = navigator.clone();
                navigator.inner.tasks.cancellable_task("status-update", move |token| async move {
                    handler.handle_status(status, token).await;
                });
            }
        });
    }

    async fn handle_status(&self, status: NavigationStatus, token: CancellationToken) {
        let session = self.inner.events.current_session();
        if session.state == SessionState::Idle {
            warn!("status received while idle");
            self.inner
                .events
                .publish_error(NavigatorError::UnexpectedStatus);
            return;
        }

        // A status racing a rapid state transition carries a session that
        // is already gone; drop it quietly.
        let session_id = self.lock_state().session_id;
        let Some(session_id) = session_id else {
            warn!("status received without a session id, dropped");
            return;
        };
        if self.inner.billing.session_state(session_id) == BillingState::Stopped {
            warn!(%session_id, "status for a stopped session, dropped");
            return;
        }

        self.inner.events.publish_map_matching(MapMatchingState {
            location: status.location.clone(),
            off_road: status.route_state == RouteState::OffRoute,
        });

        if !session.state.is_active_guidance() {
            return;
        }

        self.inner.events.publish_session(Session {
            state: SessionState::ActiveGuidance(status.route_state.into()),
        });

        let Some(bundle) = self.inner.events.current_bundle() else {
            debug!("status in active guidance without a bundle, dropped");
            return;
        };
        let bundle = self.apply_fork_passed_flags(bundle, &status);

        let progress = RouteProgress::from_status(bundle, &status);
        if token.is_cancelled() {
            return;
        }
        self.inner.events.publish_progress(Some(progress.clone()));

        let arrival = {
            let mut state = self.lock_state();
            state.arrival.check(&progress)
        };
        if let Some(event) = arrival {
            self.handle_arrival(event).await;
        }

        self.maybe_check_faster_route(&progress, &status);
    }

    /// Fold the tick's fork-passed flags into the current bundle.
    ///
    /// Flags only ever go from unpassed to passed; when the visible set
    /// changes, the bundle is republished along with an alternatives
    /// update. This is the one path by which an alternative disappears
    /// from the public list without a route change.
    fn apply_fork_passed_flags(
        &self,
        bundle: Arc<RouteBundle>,
        status: &NavigationStatus,
    ) -> Arc<RouteBundle> {
        let passed = status.passed_fork_ids();
        if passed.is_empty() {
            return bundle;
        }
        let mut updated = (*bundle).clone();
        if !updated.update_fork_points_passed(&passed) {
            return bundle;
        }
        let updated = Arc::new(updated);
        self.inner.events.replace_current_bundle(updated.clone());
        self.inner
            .events
            .publish_alternatives(AlternativesStatus::Updated {
                alternatives: updated.alternative_routes().into_iter().cloned().collect(),
            });
        updated
    }

    async fn handle_arrival(&self, event: ArrivalEvent) {
        match event {
            ArrivalEvent::FinalDestination { waypoint } => {
                info!(waypoint = ?waypoint.name, "arrived at final destination");
                self.inner
                    .events
                    .publish_arrival(WaypointArrival::ToFinalDestination { waypoint });
            }
            ArrivalEvent::Waypoint {
                leg_index,
                waypoint,
            } => {
                info!(waypoint = ?waypoint.name, leg = leg_index, "arrived at waypoint");
                self.inner.events.publish_arrival(WaypointArrival::ToWaypoint {
                    waypoint: waypoint.clone(),
                    leg_index,
                });
                let next_leg = leg_index + 1;
                match &self.inner.config.leg_advance {
                    LegAdvancePolicy::Automatically => {
                        // Failure is already surfaced as an error event.
                        let _ = self.switch_leg(next_leg).await;
                    }
                    LegAdvancePolicy::Manually(approval) => {
                        let approval = approval.clone();
                        let navigator = self.clone();
                        tokio::spawn(async move {
                            if approval.should_advance(&waypoint, next_leg).await {
                                let _ = navigator.switch_leg(next_leg).await;
                            } else {
                                debug!(leg = next_leg, "leg advance declined");
                            }
                        });
                    }
                }
            }
        }
    }

    /// Advance progress tracking to `leg_index`.
    ///
    /// Valid only in active guidance with a running billing session. On
    /// success the engine advances, a fresh billing trip is begun under
    /// the same UUID (billing is per leg in multi-leg trips), and a
    /// `NextLegStarted` event is published. On failure the leg index is
    /// left unchanged.
    pub async fn switch_leg(&self, leg_index: usize) -> Result<(), NavigatorError> {
        let session = self.inner.events.current_session();
        let session_id = self.lock_state().session_id;
        let billing_running = session_id
            .map(|uuid| self.inner.billing.session_state(uuid) == BillingState::Running)
            .unwrap_or(false);
        if !session.state.is_active_guidance() || !billing_running {
            warn!(state = %session.state, "leg switch requested outside running guidance");
            let error = NavigatorError::FailedToSelectRouteLeg;
            self.inner.events.publish_error(error.clone());
            return Err(error);
        }

        if !self.inner.engine.update_leg(leg_index).await {
            warn!(leg = leg_index, "engine refused leg switch");
            let error = NavigatorError::FailedToSelectRouteLeg;
            self.inner.events.publish_error(error.clone());
            return Err(error);
        }

        {
            let mut state = self.lock_state();
            state.current_leg = leg_index;
        }
        if let Some(uuid) = session_id {
            self.inner.billing.begin_new_billing_session_if_exists(uuid);
        }
        self.inner
            .events
            .publish_arrival(WaypointArrival::NextLegStarted { leg_index });
        info!(leg = leg_index, "leg switched");
        Ok(())
    }

    /// Promote the alternative at `index` (into the visible, fork-unpassed
    /// list) to the main route.
    ///
    /// Re-derives a brand-new bundle with every other alternative's deltas
    /// recomputed against the promoted route, then activates it with
    /// reason `Alternatives`. Fails without side effects when the index is
    /// out of range.
    pub async fn select_alternative(&self, index: usize) -> Result<(), NavigatorError> {
        let session = self.inner.events.current_session();
        if !session.state.is_active_guidance() {
            warn!(state = %session.state, "alternative selection outside active guidance");
            let error = NavigatorError::FailedToSelectAlternativeRoute;
            self.inner.events.publish_error(error.clone());
            return Err(error);
        }
        let promoted = self
            .inner
            .events
            .current_bundle()
            .and_then(|bundle| bundle.promoting_alternative(index));
        let Some(promoted) = promoted else {
            warn!(index, "no such alternative to promote");
            let error = NavigatorError::FailedToSelectAlternativeRoute;
            self.inner.events.publish_error(error.clone());
            return Err(error);
        };

        let leg_count = promoted.main_route().legs.len();
        let leg_index = self.lock_state().current_leg.min(leg_count.saturating_sub(1));
        self.activate(Arc::new(promoted), leg_index, SetRouteReason::Alternatives, None)
            .await?;

        if let Some(bundle) = self.inner.events.current_bundle() {
            self.inner
                .events
                .publish_alternatives(AlternativesStatus::Updated {
                    alternatives: bundle.alternative_routes().into_iter().cloned().collect(),
                });
        }
        Ok(())
    }

    /// Promote the alternative carrying `route_id`, if it is still offered.
    pub async fn select_alternative_by_id(&self, route_id: &RouteId) -> Result<(), NavigatorError> {
        let index = self
            .inner
            .events
            .current_bundle()
            .and_then(|bundle| bundle.visible_index_of(route_id));
        match index {
            Some(index) => self.select_alternative(index).await,
            None => {
                warn!(%route_id, "no offered alternative with this route id");
                let error = NavigatorError::FailedToSelectAlternativeRoute;
                self.inner.events.publish_error(error.clone());
                Err(error)
            }
        }
    }

    /// Kick off a proactive faster-route check when every gate passes.
    ///
    /// The fetch and evaluation run as a cancellable task; the resulting
    /// activation is handed off to a detached task guarded by the check's
    /// generation so a stale result can never overwrite a newer route.
    fn maybe_check_faster_route(&self, progress: &RouteProgress, status: &NavigationStatus) {
        let generation = {
            let mut state = self.lock_state();
            let reroute_in_flight = state.reroute_in_flight;
            if !state
                .faster
                .should_check(Instant::now(), progress, reroute_in_flight)
            {
                return;
            }
            state.faster.begin_check(Instant::now())
        };

        let request = RouteRequest {
            origin: status.location.coordinate,
            bearing: status.location.bearing,
            waypoints: progress.remaining_waypoints(),
        };
        let progress = progress.clone();
        let navigator = self.clone();
        debug!(generation, "faster-route check starts");
        self.inner
            .tasks
            .cancellable_task("faster-route-check", move |token| async move {
                let result = navigator.inner.routing.calculate_routes(request).await;
                if token.is_cancelled() {
                    return;
                }
                let candidates = match result {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        debug!(error = %e, "faster-route fetch failed");
                        return;
                    }
                };
                let selected = {
                    let state = navigator.lock_state();
                    if !state.faster.is_current(generation) {
                        debug!(generation, "faster-route result is stale, discarded");
                        return;
                    }
                    state.faster.select_faster(&candidates, &progress)
                };
                let Some(route) = selected else {
                    navigator
                        .inner
                        .events
                        .publish_faster_routes(FasterRoutesStatus::NoFasterRoute);
                    return;
                };
                navigator
                    .inner
                    .events
                    .publish_faster_routes(FasterRoutesStatus::Detected {
                        route: route.clone(),
                    });

                let approved = match &navigator.inner.config.faster_route_approval {
                    FasterRouteApprovalPolicy::Automatic => true,
                    FasterRouteApprovalPolicy::Manual(hook) => hook.should_apply(&route).await,
                };
                if !approved || token.is_cancelled() {
                    debug!("faster route not applied");
                    return;
                }

                // Activation takes the barrier, so it must outlive this
                // cancellable task; the generation guard handles staleness.
                let bundle = Arc::new(RouteBundle::new(route.clone()));
                let route_id = route.id.clone();
                let activator = navigator.clone();
                tokio::spawn(async move {
                    let guard: super::navigator::ActivationGuard =
                        Box::new(move |state| state.faster.is_current(generation));
                    let applied = activator
                        .activate(bundle, 0, SetRouteReason::FasterRoute, Some(guard))
                        .await;
                    if applied.is_ok() {
                        activator
                            .inner
                            .events
                            .publish_faster_routes(FasterRoutesStatus::Applied { route_id });
                    }
                });
            });
    }
}

/// Drain queued ticks, keeping only the newest.
fn drain_to_latest(
    receiver: &mut broadcast::Receiver<NavigationStatus>,
    mut latest: NavigationStatus,
) -> NavigationStatus {
    loop {
        match receiver.try_recv() {
            Ok(status) => latest = status,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    latest
}
