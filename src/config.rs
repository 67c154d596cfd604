//! Node configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryTag;
use crate::Result;

/// Configuration for a [`Node`](crate::Node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Peer discovery settings.
    pub peer_discovery: PeerDiscoveryConfig,
    /// Timeout for a single dial attempt, in milliseconds. Default: 30 000.
    pub dial_timeout_ms: u64,
    /// Timeout for a mechanism's `start()` or `stop()`, in milliseconds.
    /// Default: 10 000.
    pub mechanism_timeout_ms: u64,
    /// Buffer size of the node event bus. Default: 256.
    pub event_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_discovery: PeerDiscoveryConfig::default(),
            dial_timeout_ms: 30_000,
            mechanism_timeout_ms: 10_000,
            event_capacity: 256,
        }
    }
}

impl NodeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Per-dial timeout.
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    /// Per-mechanism start/stop timeout.
    pub fn mechanism_timeout(&self) -> Duration {
        Duration::from_millis(self.mechanism_timeout_ms)
    }
}

/// Discovery settings: global switches plus one entry per mechanism tag.
///
/// In JSON the mechanism entries sit next to the switches:
///
/// ```json
/// { "auto_dial": true, "webrtc-star": { "enabled": true } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerDiscoveryConfig {
    /// Dial known peers on start and discovered peers as they arrive.
    /// Default: true.
    pub auto_dial: bool,
    /// Discovery-driven dials only happen while the dialer reports fewer
    /// connections than this. Default: 0.
    pub min_connections: usize,
    /// Per-mechanism entries keyed by tag.
    #[serde(flatten)]
    pub mechanisms: BTreeMap<DiscoveryTag, MechanismConfig>,
}

impl Default for PeerDiscoveryConfig {
    fn default() -> Self {
        Self {
            auto_dial: true,
            min_connections: 0,
            mechanisms: BTreeMap::new(),
        }
    }
}

impl PeerDiscoveryConfig {
    /// Set the entry for a mechanism.
    pub fn with_mechanism(mut self, tag: impl Into<DiscoveryTag>, config: MechanismConfig) -> Self {
        self.mechanisms.insert(tag.into(), config);
        self
    }

    /// Entry for a mechanism, if configured.
    pub fn mechanism(&self, tag: &DiscoveryTag) -> Option<&MechanismConfig> {
        self.mechanisms.get(tag)
    }

    /// How the configuration treats a mechanism.
    pub fn setting(&self, tag: &DiscoveryTag) -> MechanismSetting {
        match self.mechanisms.get(tag).and_then(|m| m.enabled) {
            Some(true) => MechanismSetting::Enabled,
            Some(false) => MechanismSetting::Disabled,
            None => MechanismSetting::Unconfigured,
        }
    }
}

/// Resolved enable state of a mechanism tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismSetting {
    /// No entry, or an entry without `enabled`.
    Unconfigured,
    /// `enabled: true`.
    Enabled,
    /// `enabled: false`.
    Disabled,
}

impl MechanismSetting {
    /// Whether a mechanism with this setting is included, given its default.
    pub fn includes(self, enabled_by_default: bool) -> bool {
        match self {
            Self::Enabled => true,
            Self::Disabled => false,
            Self::Unconfigured => enabled_by_default,
        }
    }
}

/// Configuration entry for one discovery mechanism.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MechanismConfig {
    /// Explicit enable switch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Announcement interval, in milliseconds, for mechanisms that poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Mechanism-specific options passed through to its factory.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl MechanismConfig {
    /// An entry with `enabled: true`.
    pub fn enabled() -> Self {
        Self {
            enabled: Some(true),
            ..Self::default()
        }
    }

    /// An entry with `enabled: false`.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    /// Announcement interval, if set.
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}
