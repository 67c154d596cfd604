//! Transports as seen by discovery: optional contributors of a mechanism.

use std::sync::Arc;

use crate::config::MechanismConfig;
use crate::discovery::{Discovery, DiscoveryTag};

/// A transport registered with the node.
///
/// Only the discovery side is relevant here; connection handling lives in
/// the [`Dialer`](crate::Dialer).
pub trait Transport: Send + Sync + 'static {
    /// Human-readable name for logging (e.g. "tcp", "webrtc-star").
    fn name(&self) -> &str;

    /// Factory for the discovery mechanism this transport contributes.
    fn discovery(&self) -> Option<&dyn DiscoveryFactory> {
        None
    }
}

/// Lazily constructs a transport-contributed discovery mechanism.
///
/// The registry consults [`tag()`](DiscoveryFactory::tag) and the node
/// configuration first and only calls [`create()`](DiscoveryFactory::create)
/// for mechanisms that are enabled, so a disabled mechanism is never built.
pub trait DiscoveryFactory: Send + Sync {
    /// Tag of the mechanism this factory builds.
    fn tag(&self) -> DiscoveryTag;

    /// Whether the mechanism runs when configuration does not mention it.
    fn enabled_by_default(&self) -> bool {
        false
    }

    /// Build the mechanism from its configuration entry.
    fn create(&self, config: &MechanismConfig) -> Arc<dyn Discovery>;
}
