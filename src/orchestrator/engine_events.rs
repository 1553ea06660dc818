//! Reactions to discrete engine events.

use super::navigator::Navigator;
use crate::config::AlternativesAcceptancePolicy;
use crate::engine::{EngineAlternative, EngineEvent, SetRouteReason};
use crate::events::{AlternativesStatus, RefreshingStatus, ReroutingStatus};
use crate::route::{AlternativeRoute, RouteBundle, SharedRoute};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

impl Navigator {
    pub(super) fn spawn_engine_event_loop(&self) {
        let navigator = self.clone();
        let mut events = self.inner.engine.subscribe_events();
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    received = events.recv() => match received {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "engine events dropped under load");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                };
                navigator.handle_engine_event(event).await;
            }
        });
    }

    async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::RerouteDetected => {
                info!("off-route detected, reroute in progress");
                self.lock_state().reroute_in_flight = true;
                self.inner
                    .events
                    .publish_rerouting(ReroutingStatus::FetchingRoute);
            }
            EngineEvent::RerouteReceived {
                main_route,
                alternatives,
            } => self.handle_reroute_received(main_route, alternatives),
            EngineEvent::RerouteCancelled => {
                debug!("reroute cancelled by the engine");
                {
                    let mut state = self.lock_state();
                    state.reroute_in_flight = false;
                    state.reroute_generation += 1;
                }
                self.inner
                    .events
                    .publish_rerouting(ReroutingStatus::Interrupted);
            }
            EngineEvent::RerouteFailed { reason } => {
                warn!(%reason, "reroute failed");
                {
                    let mut state = self.lock_state();
                    state.reroute_in_flight = false;
                    state.reroute_generation += 1;
                }
                self.inner
                    .events
                    .publish_rerouting(ReroutingStatus::Failed {
                        message: reason.clone(),
                    });
                self.inner
                    .events
                    .publish_error(crate::error::NavigatorError::InterruptedReroute {
                        cause: Some(reason),
                    });
            }
            EngineEvent::AlternativesChanged { alternatives } => {
                self.handle_alternatives_changed(alternatives);
            }
            EngineEvent::FallbackToOffline => {
                self.reactivate_current(SetRouteReason::FallbackToOffline).await;
            }
            EngineEvent::RestoreToOnline => {
                self.reactivate_current(SetRouteReason::RestoreToOnline).await;
            }
            EngineEvent::AnnotationsRefreshed {
                main_route,
                alternatives,
                leg_index,
            } => self.handle_annotations_refreshed(main_route, alternatives, leg_index),
            EngineEvent::AnnotationsRefreshFailed { is_terminal } => {
                debug!(is_terminal, "annotation refresh failed");
                self.inner
                    .events
                    .publish_refreshing(RefreshingStatus::Failed { is_terminal });
            }
            EngineEvent::ElectronicHorizon(horizon) => {
                self.inner.events.publish_horizon(horizon);
            }
        }
    }

    /// Activate an engine-computed reactive reroute.
    ///
    /// Each received reroute bumps the generation; the activation runs
    /// detached with a generation guard so that when a second reroute
    /// arrives before the first activation finishes, the first aborts
    /// without publishing and only the newest bundle lands.
    fn handle_reroute_received(
        &self,
        main_route: SharedRoute,
        alternatives: Vec<EngineAlternative>,
    ) {
        if !self.inner.events.current_session().state.is_active_guidance() {
            debug!("reroute received outside active guidance, discarded");
            return;
        }
        let generation = {
            let mut state = self.lock_state();
            state.reroute_generation += 1;
            state.reroute_generation
        };

        let derived: Vec<AlternativeRoute> = alternatives
            .iter()
            .map(|alt| {
                AlternativeRoute::relative_to(&main_route, alt.id, alt.route.clone(), alt.fork)
            })
            .collect();
        let bundle = Arc::new(RouteBundle::with_alternatives(main_route, derived));

        let navigator = self.clone();
        tokio::spawn(async move {
            let guard: super::navigator::ActivationGuard =
                Box::new(move |state| state.reroute_generation == generation);
            // Reroutes restart progress at the new route's first leg.
            match navigator
                .activate(bundle, 0, SetRouteReason::Reroute, Some(guard))
                .await
            {
                Ok(()) => {
                    navigator.inner.events.publish_rerouting(ReroutingStatus::Idle);
                }
                Err(crate::error::NavigatorError::InterruptedReroute { .. }) => {
                    // Superseded by a newer reroute; the newer activation
                    // owns the rerouting status from here.
                }
                Err(e) => {
                    navigator.lock_state().reroute_in_flight = false;
                    navigator
                        .inner
                        .events
                        .publish_rerouting(ReroutingStatus::Failed {
                            message: e.to_string(),
                        });
                }
            }
        });
    }

    fn handle_alternatives_changed(&self, alternatives: Vec<EngineAlternative>) {
        let Some(bundle) = self.inner.events.current_bundle() else {
            debug!("alternatives update without an active bundle, discarded");
            return;
        };
        let main = bundle.main_route().clone();
        let policy = self.inner.config.alternatives_acceptance;
        let derived: Vec<AlternativeRoute> = alternatives
            .iter()
            .map(|alt| AlternativeRoute::relative_to(&main, alt.id, alt.route.clone(), alt.fork))
            .filter(|alt| match policy {
                AlternativesAcceptancePolicy::All => true,
                AlternativesAcceptancePolicy::FasterOnly => alt.travel_time_delta < 0.0,
                AlternativesAcceptancePolicy::ShorterOnly => alt.distance_delta < 0.0,
            })
            .collect();
        let updated = Arc::new(bundle.replacing_alternatives(derived));
        self.inner.events.replace_current_bundle(updated.clone());
        self.inner
            .events
            .publish_alternatives(AlternativesStatus::Updated {
                alternatives: updated.alternative_routes().into_iter().cloned().collect(),
            });
        info!(
            count = updated.alternative_routes().len(),
            "continuous alternatives updated"
        );
    }

    fn handle_annotations_refreshed(
        &self,
        main_route: Option<SharedRoute>,
        alternatives: Vec<EngineAlternative>,
        leg_index: usize,
    ) {
        let Some(bundle) = self.inner.events.current_bundle() else {
            debug!("annotation refresh without an active bundle, discarded");
            return;
        };
        if bundle.refresh_deadline().is_some() && !bundle.is_refresh_eligible(Instant::now()) {
            warn!("refresh deadline expired, bundle can no longer be refreshed");
            self.inner
                .events
                .publish_refreshing(RefreshingStatus::Failed { is_terminal: true });
            return;
        }
        let main = main_route.unwrap_or_else(|| bundle.main_route().clone());
        let derived: Vec<AlternativeRoute> = alternatives
            .iter()
            .map(|alt| AlternativeRoute::relative_to(&main, alt.id, alt.route.clone(), alt.fork))
            .collect();
        let refreshed = Arc::new(RouteBundle::with_alternatives(main, derived)
            .with_refresh_deadline(bundle.refresh_deadline()));
        self.inner.events.replace_current_bundle(refreshed);
        self.inner
            .events
            .publish_refreshing(RefreshingStatus::Refreshed);
        debug!(leg = leg_index, "route annotations refreshed");
    }

    /// Re-push the current bundle with a tileset transition reason.
    async fn reactivate_current(&self, reason: SetRouteReason) {
        let Some(bundle) = self.inner.events.current_bundle() else {
            debug!(%reason, "tileset transition without an active bundle, ignored");
            return;
        };
        let leg_index = self.lock_state().current_leg;
        info!(%reason, "re-activating current route for tileset transition");
        // Failure is surfaced as an error event by the activation itself.
        let _ = self.activate(bundle, leg_index, reason, None).await;
    }
}
