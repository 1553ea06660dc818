//! Published error taxonomy for the navigation orchestrator.
//!
//! Every failure of a mutating operation is captured locally and surfaced as
//! a [`NavigatorError`] event; the orchestrator's own published state stays
//! unchanged on failure. Consumers should treat these events as advisory:
//! the last successfully published session and route progress remain
//! authoritative until superseded.

use thiserror::Error;

/// Errors published on the orchestrator's error event stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigatorError {
    /// Pushing a route to the navigation engine failed.
    #[error("failed to set route{}", fmt_cause(.cause))]
    FailedToSetRoute {
        /// Engine-reported failure description, if any.
        cause: Option<String>,
    },

    /// An alternative route could not be promoted to the main route.
    #[error("failed to select alternative route")]
    FailedToSelectAlternativeRoute,

    /// An engine-pushed alternatives update could not be applied.
    #[error("failed to update alternative routes: {0}")]
    FailedToUpdateAlternativeRoutes(String),

    /// Advancing to another route leg failed.
    #[error("failed to select route leg")]
    FailedToSelectRouteLeg,

    /// Tearing the session down to idle failed partway.
    #[error("failed to set idle state")]
    FailedToSetIdle,

    /// Pausing free drive failed because the session was not in free drive.
    #[error("failed to pause the navigation session")]
    FailedToPause,

    /// A navigation status arrived while the session was idle.
    ///
    /// Indicates a collaborator bug: the engine must not produce statuses
    /// without an active session.
    #[error("received a navigation status while idle")]
    UnexpectedStatus,

    /// An in-flight reroute was cancelled or failed before completion.
    #[error("reroute was interrupted{}", fmt_cause(.cause))]
    InterruptedReroute {
        /// Underlying routing failure, if the reroute failed rather than
        /// being cancelled.
        cause: Option<String>,
    },
}

fn fmt_cause(cause: &Option<String>) -> String {
    match cause {
        Some(cause) => format!(": {cause}"),
        None => String::new(),
    }
}
