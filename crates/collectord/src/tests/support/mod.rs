//! Test doubles shared by the receiver's unit and behavioural suites.

mod acceptor;
mod config_loader;
mod handler;
mod lifecycle;
mod reporter;
mod world;

pub use acceptor::{StubAcceptor, StubPeer};
pub use config_loader::{FailingConfigLoader, TestConfigLoader, test_config};
pub use handler::{RecordingHandler, RecordingReply, envelope_bytes};
pub use lifecycle::{LifecycleRecord, RecordingSink};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{ReceiverWorld, receiver_world};
