//! Billing backend seam.
//!
//! The backend tracks one wall-clock session per trip type. The
//! [`crate::billing::BillingHandler`] maps any number of orchestrator-side
//! session UUIDs onto these per-type backend sessions.

use thiserror::Error;

/// Trip type a billing session is billed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    /// Map-matching only, no active route.
    FreeDrive,
    /// Turn-by-turn guidance along a route.
    ActiveGuidance,
}

impl SessionType {
    /// Maximum wall-clock validity of one backend session.
    pub fn max_session_duration(&self) -> std::time::Duration {
        match self {
            // 12h for guidance trips, 1h for free drive
            Self::ActiveGuidance => std::time::Duration::from_secs(43_200),
            Self::FreeDrive => std::time::Duration::from_secs(3_600),
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeDrive => write!(f, "Free Drive"),
            Self::ActiveGuidance => write!(f, "Active Guidance"),
        }
    }
}

/// Backend-reported run state of a billing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session exists.
    #[default]
    Stopped,
    /// A session exists but is paused.
    Paused,
    /// A session is running.
    Running,
}

/// Failures reported by the billing backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BillingError {
    /// The account token was rejected.
    #[error("billing token validation failed")]
    TokenValidationFailed,
    /// Resume was requested for a session the backend no longer has.
    #[error("billing session resume failed")]
    ResumeFailed,
    /// Any other backend failure.
    #[error("billing backend error: {0}")]
    Backend(String),
}

/// The billing backend contract.
///
/// The backend keys sessions by [`SessionType`], not UUID: it can hold at
/// most one session per type at a time.
pub trait BillingBackend: Send + Sync {
    /// Begin (or restart) the backend session for a trip type.
    fn begin_session(&self, session_type: SessionType) -> Result<(), BillingError>;

    /// Pause the backend session for a trip type.
    fn pause_session(&self, session_type: SessionType);

    /// Resume a paused backend session.
    fn resume_session(&self, session_type: SessionType) -> Result<(), BillingError>;

    /// Stop the backend session for a trip type.
    fn stop_session(&self, session_type: SessionType);

    /// Current backend state for a trip type.
    fn session_status(&self, session_type: SessionType) -> SessionState;
}
