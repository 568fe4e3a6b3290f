//! Configuration loaders for bootstrap scenarios.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoError;

use collector_config::Config;

use crate::bootstrap::ConfigLoader;

/// Small pools on an ephemeral loopback port.
pub fn test_config() -> Config {
    Config {
        listen_ip: String::from("127.0.0.1"),
        listen_port: 0,
        worker_threads: 2,
        worker_queue_size: 8,
        event_worker_threads: 1,
        event_worker_queue_size: 8,
        ..Config::default()
    }
}

/// Loader returning [`test_config`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TestConfigLoader;

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(test_config())
    }
}

/// Loader that fails by passing an unparsable CLI argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("collectord"),
            OsString::from("--worker-threads"),
            OsString::from("many"),
        ];
        Config::load_from_iter(args)
    }
}
