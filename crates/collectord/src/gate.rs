//! Handshake validation applied before a connection may carry traffic.
//!
//! The gate inspects only the property set an agent presents while
//! connecting: every required key must be present with a value of the
//! expected kind, and the optional `supports-duplex` flag selects the
//! communication mode. Acting on the decision is the transport's job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property key selecting duplex communication.
pub const SUPPORTS_DUPLEX: &str = "supports-duplex";

/// Property key carrying the agent identifier.
pub const AGENT_ID: &str = "agent-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    Text,
    Integer,
}

impl PropertyKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
        }
    }
}

const REQUIRED_PROPERTIES: &[(&str, PropertyKind)] = &[
    (AGENT_ID, PropertyKind::Text),
    ("application-name", PropertyKind::Text),
    ("hostname", PropertyKind::Text),
    ("ip", PropertyKind::Text),
    ("pid", PropertyKind::Integer),
    ("service-type", PropertyKind::Integer),
    ("version", PropertyKind::Text),
    ("start-timestamp", PropertyKind::Integer),
];

/// Property set supplied by a connecting agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct HandshakeProperties(BTreeMap<String, Value>);

impl HandshakeProperties {
    /// Builds an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `key` bound to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Binds `key` to `value`, replacing any previous binding.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Looks up a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Agent identifier, when present as text.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        self.get(AGENT_ID).and_then(Value::as_str)
    }

    /// Whether every required key is present with a value of the right kind.
    #[must_use]
    pub fn has_required(&self) -> bool {
        REQUIRED_PROPERTIES
            .iter()
            .all(|(key, kind)| self.get(key).is_some_and(|value| kind.matches(value)))
    }

    /// Reads `supports-duplex`, defaulting to `true` when absent or not a boolean.
    #[must_use]
    pub fn supports_duplex(&self) -> bool {
        self.get(SUPPORTS_DUPLEX)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Names of the keys every handshake must carry.
    pub fn required_keys() -> impl Iterator<Item = &'static str> {
        REQUIRED_PROPERTIES.iter().map(|(key, _)| *key)
    }
}

impl<K, V> FromIterator<(K, V)> for HandshakeProperties
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Outcome of validating a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandshakeDecision {
    /// No property set was supplied.
    RejectedMalformed,
    /// One or more required properties were missing.
    RejectedIncompleteProperties,
    /// Accepted; the collector may also send requests to the agent.
    AcceptedDuplex,
    /// Accepted; traffic flows from the agent only.
    AcceptedSimplex,
}

impl HandshakeDecision {
    /// Whether the connection may carry traffic.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::AcceptedDuplex | Self::AcceptedSimplex)
    }
}

/// Validates agent handshakes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectionGate;

impl ConnectionGate {
    /// Decides whether a connection presenting `properties` is accepted.
    #[must_use]
    pub fn decide(&self, properties: Option<&HandshakeProperties>) -> HandshakeDecision {
        let Some(properties) = properties else {
            return HandshakeDecision::RejectedMalformed;
        };
        if !properties.has_required() {
            return HandshakeDecision::RejectedIncompleteProperties;
        }
        if properties.supports_duplex() {
            HandshakeDecision::AcceptedDuplex
        } else {
            HandshakeDecision::AcceptedSimplex
        }
    }
}
