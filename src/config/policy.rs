//! Approval policies for leg advancement and faster-route acceptance.

use crate::route::{SharedRoute, Waypoint};
use async_trait::async_trait;
use std::sync::Arc;

/// External confirmation hook for advancing to the next leg.
#[async_trait]
pub trait LegAdvanceApproval: Send + Sync {
    /// Whether the trip should advance past `waypoint` onto `next_leg_index`.
    async fn should_advance(&self, waypoint: &Waypoint, next_leg_index: usize) -> bool;
}

/// How the orchestrator advances legs after an intermediate arrival.
#[derive(Clone)]
pub enum LegAdvancePolicy {
    /// Advance as soon as arrival is confirmed.
    Automatically,
    /// Ask the given hook; the leg index stays unchanged until it approves.
    Manually(Arc<dyn LegAdvanceApproval>),
}

/// External confirmation hook for applying a detected faster route.
#[async_trait]
pub trait FasterRouteApproval: Send + Sync {
    /// Whether `candidate` should replace the currently tracked route.
    async fn should_apply(&self, candidate: &SharedRoute) -> bool;
}

/// How a detected faster route gets accepted.
#[derive(Clone)]
pub enum FasterRouteApprovalPolicy {
    /// Apply immediately on detection.
    Automatic,
    /// Ask the given hook before applying.
    Manual(Arc<dyn FasterRouteApproval>),
}

/// Which engine-pushed continuous alternatives are offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlternativesAcceptancePolicy {
    /// Offer every alternative the engine tracks.
    #[default]
    All,
    /// Offer only alternatives with a shorter expected travel time than
    /// the main route.
    FasterOnly,
    /// Offer only alternatives with a shorter distance than the main
    /// route.
    ShorterOnly,
}
