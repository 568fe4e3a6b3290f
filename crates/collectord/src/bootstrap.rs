//! Collector bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use collector_config::{Config, ConfigError};

use crate::codec::Codec;
use crate::dispatch::DispatchHandler;
use crate::health::HealthReporter;
use crate::receiver::{Collaborators, ReceiverError, TcpReceiver};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the collector configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but violates an invariant.
    #[error("invalid configuration: {source}")]
    Invalid {
        /// Violated invariant.
        #[source]
        source: ConfigError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Collector {
    config: Config,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Collector {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Builds a receiver from the bootstrapped configuration, reporting
    /// through the bootstrap reporter.
    pub fn receiver<C, D>(
        &self,
        collaborators: Collaborators<C, D>,
    ) -> Result<TcpReceiver<C, D>, ReceiverError>
    where
        C: Codec,
        D: DispatchHandler<C::Message>,
    {
        TcpReceiver::new(&self.config, collaborators)
            .map(|receiver| receiver.with_reporter(Arc::clone(&self.reporter)))
    }
}

/// Bootstraps the collector using the supplied collaborators.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Collector, BootstrapError> {
    reporter.bootstrap_starting();

    let result = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })
        .and_then(|config| {
            config
                .validate()
                .map_err(|source| BootstrapError::Invalid { source })?;
            let telemetry = telemetry::initialise(&config)
                .map_err(|source| BootstrapError::Telemetry { source })?;
            Ok((config, telemetry))
        });

    match result {
        Ok((config, telemetry)) => {
            reporter.bootstrap_succeeded(&config);
            Ok(Collector {
                config,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}
