//! Gates for proactive faster-route checks.

use std::time::Duration;

/// Tuning for the proactive faster-route monitor.
///
/// A check only runs when every gate passes; a candidate is only accepted
/// when it beats the remaining time by at least the acceptance ratio and
/// still begins with the user's anticipated maneuver.
#[derive(Debug, Clone)]
pub struct FasterRouteConfig {
    /// Whether proactive checks run at all.
    pub enabled: bool,
    /// No check runs when less than this remains on the current route;
    /// rerouting a nearly finished trip is not worth the churn.
    pub min_remaining_duration: Duration,
    /// No check runs when the next maneuver is closer than this, so an
    /// imminent turn is never interrupted.
    pub min_maneuver_offset: Duration,
    /// Minimum time between consecutive checks.
    pub check_interval: Duration,
    /// A candidate is faster only when its total time is at most this
    /// fraction of the current route's remaining time.
    pub acceptance_ratio: f64,
}

impl Default for FasterRouteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_remaining_duration: Duration::from_secs(600),
            min_maneuver_offset: Duration::from_secs(70),
            check_interval: Duration::from_secs(120),
            acceptance_ratio: 0.9,
        }
    }
}
