//! navflow - Navigation session orchestration
//!
//! This library coordinates a trip's lifecycle (idle, free drive, active
//! guidance) on top of a map-matching engine, a route computation service
//! and a billing backend, and fans the resulting state out as typed event
//! streams.
//!
//! # High-Level API
//!
//! Construct a [`orchestrator::Navigator`] over the collaborator
//! implementations and subscribe to its event hub:
//!
//! ```ignore
//! use navflow::config::NavigatorConfig;
//! use navflow::orchestrator::Navigator;
//!
//! let navigator = Navigator::start(engine, routing, billing, location, NavigatorConfig::default());
//! let mut sessions = navigator.events().subscribe_session();
//!
//! navigator.start_active_guidance(bundle, 0).await?;
//! ```

pub mod billing;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod location;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod route;
pub mod routing;
pub mod tasks;

pub use error::NavigatorError;

/// Version of the navflow library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
