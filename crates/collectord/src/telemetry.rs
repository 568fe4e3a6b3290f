//! Global `tracing` subscriber setup for the collector.
//!
//! Every worker and connection thread is named (`collector-tcp-worker-3`,
//! `collector-tcp-connection-17`), so records carry the thread name instead
//! of an opaque id. JSON output never carries ANSI escapes; compact output
//! colours only an interactive stderr.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use collector_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Proof that the global subscriber is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber already owns the global slot.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls return a handle without reinstalling anything, so the
/// filter and format of the first successful call stay in force for the
/// life of the process.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| {
            let filter = parse_filter(config.log_filter())?;
            let subscriber = build_subscriber(filter, config.log_format());
            tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
        })
        .map(|_| TelemetryHandle)
}

fn parse_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn build_subscriber(filter: EnvFilter, format: LogFormat) -> BoxedSubscriber {
    let base = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    match format {
        LogFormat::Json => Box::new(
            base.json()
                .flatten_event(true)
                .with_current_span(false)
                .with_ansi(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(
            base.compact()
                .with_ansi(io::stderr().is_terminal())
                .finish(),
        ),
    }
}
