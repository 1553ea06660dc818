//! Session state published to consumers.

use crate::engine::RouteState;

/// Sub-state while in free drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeDriveState {
    /// Location updates flowing, billing running.
    Active,
    /// Location updates stopped, billing paused, session preserved.
    Paused,
}

/// Sub-state while in active guidance, mirroring the engine's route state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveGuidanceState {
    /// A route was just activated; tracking has not stabilized yet.
    Initialized,
    /// Progressing along the route.
    Tracking,
    /// Off the route; a reactive reroute is expected.
    OffRoute,
    /// The engine cannot currently judge on/off route.
    Uncertain,
    /// Arrived at the current leg's destination.
    Complete,
}

impl From<RouteState> for ActiveGuidanceState {
    fn from(state: RouteState) -> Self {
        match state {
            RouteState::Initialized => Self::Initialized,
            RouteState::Tracking => Self::Tracking,
            RouteState::OffRoute => Self::OffRoute,
            RouteState::Uncertain => Self::Uncertain,
            RouteState::Complete => Self::Complete,
        }
    }
}

/// The current trip state.
///
/// Exactly one value exists at a time; transitions replace the whole value
/// rather than mutating in place, so equality checks stay cheap and
/// consecutive duplicates can be suppressed at the publication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No trip in progress.
    Idle,
    /// Map-matching location without an active route.
    FreeDrive(FreeDriveState),
    /// Tracking progress along a chosen route.
    ActiveGuidance(ActiveGuidanceState),
}

impl SessionState {
    /// Whether any kind of active guidance is in progress.
    pub fn is_active_guidance(&self) -> bool {
        matches!(self, Self::ActiveGuidance(_))
    }

    /// Whether location updates should currently be flowing.
    pub fn wants_location_updates(&self) -> bool {
        match self {
            Self::Idle | Self::FreeDrive(FreeDriveState::Paused) => false,
            Self::FreeDrive(FreeDriveState::Active) | Self::ActiveGuidance(_) => true,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FreeDrive(FreeDriveState::Active) => write!(f, "free-drive (active)"),
            Self::FreeDrive(FreeDriveState::Paused) => write!(f, "free-drive (paused)"),
            Self::ActiveGuidance(state) => write!(f, "active-guidance ({state:?})"),
        }
    }
}

/// The published session value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Current trip state.
    pub state: SessionState,
}

impl Session {
    pub fn idle() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::idle()
    }
}
