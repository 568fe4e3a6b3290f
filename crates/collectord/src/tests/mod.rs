//! Test suites for the collector receiver.

mod shutdown_behaviour;
pub(crate) mod support;
