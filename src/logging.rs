//! Opt-in tracing setup for host applications.
//!
//! The crate only emits `tracing` events; it never installs a subscriber
//! on its own. Hosts that want file-backed logs without wiring up
//! `tracing-subscriber` themselves can call [`init_tracing`], which
//! appends to a log file through a non-blocking writer and filters via
//! `RUST_LOG`, falling back to the crate at `info`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVE: &str = "navflow=info";

/// Where tracing output goes.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Directory the log file lives in. Created when missing.
    pub directory: PathBuf,
    /// File name within `directory`. Appended to across runs.
    pub file_name: String,
    /// Mirror events to stderr as well as the file.
    pub mirror_to_stderr: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "navflow.log".to_string(),
            mirror_to_stderr: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TracingSetupError {
    #[error("failed to create log directory: {0}")]
    CreateDirectory(#[from] io::Error),
    #[error("a tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the background log writer alive. Dropping it flushes and closes
/// the log file.
#[must_use = "dropping the guard stops log output"]
pub struct TracingGuard {
    _writer: WorkerGuard,
}

/// Install a process-wide subscriber writing to the configured file.
///
/// Fails when a subscriber is already installed, so hosts with their own
/// `tracing` setup keep it.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TracingSetupError> {
    std::fs::create_dir_all(&config.directory)?;

    let appender = tracing_appender::rolling::never(&config.directory, &config.file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .compact();

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.mirror_to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .try_init()?;
    } else {
        registry.try_init()?;
    }

    Ok(TracingGuard { _writer: guard })
}
