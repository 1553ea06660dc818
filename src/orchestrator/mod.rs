//! The session orchestrator.
//!
//! [`Navigator`] owns the trip state machine (idle, free drive, active
//! guidance), funnels every mutating operation through the task/barrier
//! coordinator, consumes the engine's status and event streams, and
//! publishes typed events through [`crate::events::EventHub`]. It is the
//! only writer of session, bundle and progress state.

mod engine_events;
mod guidance;
mod navigator;

pub use navigator::Navigator;
