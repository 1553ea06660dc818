//! Billing session lifecycle management.
//!
//! The handler owns the mapping from orchestrator session UUIDs to the
//! backend's one-session-per-type model, and implements the dedup rules
//! that keep billing from double-counting: a backend session is only
//! stopped when the last UUID of its type goes away, only paused when
//! every remaining UUID of its type is paused, and only begun when the
//! backend reports no session for the type.

use super::backend::{BillingBackend, SessionState, SessionType};
use crate::geo::LatLon;
use crate::route::{similarity, Route, Waypoint};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Waypoints further apart than this are considered different stops for
/// the new-session heuristic, in meters.
pub const WAYPOINT_PROXIMITY_THRESHOLD_M: f64 = 100.0;

#[derive(Debug, Clone, Copy)]
struct SessionRecord {
    session_type: SessionType,
    is_paused: bool,
}

/// Maps orchestrator trip sessions onto backend billing sessions.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct BillingHandler {
    backend: Arc<dyn BillingBackend>,
    sessions: Arc<Mutex<HashMap<Uuid, SessionRecord>>>,
}

impl BillingHandler {
    /// Create a handler over a backend implementation.
    pub fn new(backend: Arc<dyn BillingBackend>) -> Self {
        Self {
            backend,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// State of the session identified by `uuid`.
    pub fn session_state(&self, uuid: Uuid) -> SessionState {
        let sessions = self.lock_sessions();
        match sessions.get(&uuid) {
            Some(record) if record.is_paused => SessionState::Paused,
            Some(_) => SessionState::Running,
            None => SessionState::Stopped,
        }
    }

    /// Trip type of the session identified by `uuid`, if it exists.
    pub fn session_type(&self, uuid: Uuid) -> Option<SessionType> {
        self.lock_sessions().get(&uuid).map(|r| r.session_type)
    }

    /// Begin a billing session of `session_type` identified by `uuid`.
    ///
    /// If the backend already has a running session of this type, nothing
    /// is billed anew; a paused backend session is resumed instead of
    /// restarted.
    pub fn begin_billing_session(&self, session_type: SessionType, uuid: Uuid) {
        let backend_status = {
            let mut sessions = self.lock_sessions();
            sessions
                .entry(uuid)
                .and_modify(|record| record.is_paused = false)
                .or_insert(SessionRecord {
                    session_type,
                    is_paused: false,
                });
            self.backend.session_status(session_type)
        };

        match backend_status {
            SessionState::Stopped => {
                info!(%session_type, %uuid, "billing session starts");
                if let Err(e) = self.backend.begin_session(session_type) {
                    error!(%session_type, error = %e, "billing session failed to start");
                    self.lock_sessions().remove(&uuid);
                }
            }
            SessionState::Paused => self.resume_billing_session(uuid),
            SessionState::Running => {}
        }
    }

    /// Force a fresh backend trip for an existing session.
    ///
    /// Used for per-leg billing in multi-leg trips: advancing a leg bills
    /// a new backend trip under the same UUID.
    pub fn begin_new_billing_session_if_exists(&self, uuid: Uuid) {
        let record = match self.lock_sessions().get(&uuid) {
            Some(record) => *record,
            None => return,
        };

        info!(session_type = %record.session_type, %uuid, "billing session restarts");
        if let Err(e) = self.backend.begin_session(record.session_type) {
            error!(session_type = %record.session_type, error = %e, "billing session failed to restart");
        }
        if record.is_paused {
            self.pause_billing_session(uuid);
        }
    }

    /// Stop the session identified by `uuid`.
    ///
    /// The backend session is only stopped when no other UUID of the same
    /// type remains; if others remain but all are paused, the backend
    /// session is paused instead.
    pub fn stop_billing_session(&self, uuid: Uuid) {
        let (session_type, trigger_stop, trigger_pause) = {
            let mut sessions = self.lock_sessions();
            let record = match sessions.remove(&uuid) {
                Some(record) => record,
                None => return,
            };
            let has_same_type = Self::has_session(&sessions, record.session_type, None);
            let backend_status = self.backend.session_status(record.session_type);
            let trigger_stop = !has_same_type && backend_status != SessionState::Stopped;
            let trigger_pause = !trigger_stop
                && has_same_type
                && !Self::has_session(&sessions, record.session_type, Some(false))
                && backend_status != SessionState::Paused;
            (record.session_type, trigger_stop, trigger_pause)
        };

        if trigger_stop {
            info!(%session_type, %uuid, "billing session stops");
            self.backend.stop_session(session_type);
        } else if trigger_pause {
            info!(%session_type, %uuid, "billing session pauses on stop");
            self.backend.pause_session(session_type);
        }
    }

    /// Pause the session identified by `uuid`, preserving its UUID so it
    /// can resume without re-billing.
    pub fn pause_billing_session(&self, uuid: Uuid) {
        let trigger = {
            let mut sessions = self.lock_sessions();
            let record = match sessions.get_mut(&uuid) {
                Some(record) => record,
                None => {
                    warn!(%uuid, "attempt to pause a non-existing billing session");
                    return;
                }
            };
            record.is_paused = true;
            let session_type = record.session_type;
            let no_running_left = !Self::has_session(&sessions, session_type, Some(false));
            (
                session_type,
                no_running_left && self.backend.session_status(session_type) == SessionState::Running,
            )
        };

        if trigger.1 {
            info!(session_type = %trigger.0, %uuid, "billing session pauses");
            self.backend.pause_session(trigger.0);
        }
    }

    /// Resume the session identified by `uuid`.
    ///
    /// If the backend refuses the resume, the record is dropped and a
    /// fresh session is begun so billing never silently stalls.
    pub fn resume_billing_session(&self, uuid: Uuid) {
        let (session_type, trigger) = {
            let mut sessions = self.lock_sessions();
            let record = match sessions.get_mut(&uuid) {
                Some(record) => record,
                None => {
                    warn!(%uuid, "attempt to resume a non-existing billing session");
                    return;
                }
            };
            record.is_paused = false;
            let session_type = record.session_type;
            (
                session_type,
                self.backend.session_status(session_type) == SessionState::Paused,
            )
        };

        if trigger {
            info!(%session_type, %uuid, "billing session resumes");
            if self.backend.resume_session(session_type).is_err() {
                self.lock_sessions().remove(&uuid);
                self.begin_billing_session(session_type, uuid);
            }
        }
    }

    /// Whether replacing the billed route with `new_route` warrants a new
    /// active-guidance billing session.
    ///
    /// A new session is required when the remaining waypoints change
    /// (different count, or any stop moved further than
    /// [`WAYPOINT_PROXIMITY_THRESHOLD_M`]), or when the new route's
    /// geometry diverges from the billed route by at least the similarity
    /// cutoff. Minor proactive reroutes along essentially the same path
    /// keep the running session.
    pub fn should_start_new_billing_session(
        &self,
        new_route: &Route,
        billed_route: &Route,
        remaining_waypoints: &[Waypoint],
    ) -> bool {
        let new_waypoints = new_route.leg_destinations();

        if new_waypoints.is_empty() {
            // Routes without waypoints are not billed per trip.
            return false;
        }

        if new_waypoints.len() != remaining_waypoints.len() {
            info!(
                new = new_waypoints.len(),
                remaining = remaining_waypoints.len(),
                "waypoint count changed, new billing session required"
            );
            return true;
        }

        for (new_wp, current_wp) in new_waypoints.iter().zip(remaining_waypoints) {
            if waypoint_distance(new_wp, current_wp) > WAYPOINT_PROXIMITY_THRESHOLD_M {
                info!(
                    new = %new_wp.coordinate,
                    current = %current_wp.coordinate,
                    "waypoint moved beyond proximity threshold, new billing session required"
                );
                return true;
            }
        }

        if !similarity::routes_are_similar(new_route, billed_route) {
            info!("route geometry diverged, new billing session required");
            return true;
        }

        false
    }

    fn has_session(
        sessions: &HashMap<Uuid, SessionRecord>,
        session_type: SessionType,
        is_paused: Option<bool>,
    ) -> bool {
        sessions.values().any(|record| {
            record.session_type == session_type
                && is_paused.is_none_or(|paused| record.is_paused == paused)
        })
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SessionRecord>> {
        // The registry holds no poisoning hazards: every critical section
        // is a few map operations.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn waypoint_distance(a: &Waypoint, b: &Waypoint) -> f64 {
    LatLon::distance_to(&a.coordinate, &b.coordinate)
}
