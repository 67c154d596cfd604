//! Pluggable discovery mechanisms and their orchestration.
//!
//! - Mechanisms implement the [`Discovery`] trait
//! - The [`DiscoveryRegistry`] assembles the active set from explicit
//!   configuration and transport-contributed factories
//! - The [`DiscoveryRouter`] is attached to every active mechanism and turns
//!   raw announcements into node events

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::peer::DiscoveredPeer;
use crate::Result;

mod bootstrap;
mod exchange;
mod listeners;
mod registry;
mod router;

pub use bootstrap::BootstrapDiscovery;
pub use exchange::PeerExchangeDiscovery;
pub use listeners::{PeerListeners, Subscription};
pub use registry::DiscoveryRegistry;
pub use router::DiscoveryRouter;

/// Stable name of a discovery mechanism, unique within a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryTag(String);

impl DiscoveryTag {
    /// Create a tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiscoveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DiscoveryTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for DiscoveryTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl Borrow<str> for DiscoveryTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Callback invoked for every peer a mechanism announces.
///
/// Handlers run on the mechanism's own context and must not block or
/// cancel subscriptions. They may announce on the same mechanism again.
pub type PeerHandler = Arc<dyn Fn(DiscoveredPeer) + Send + Sync>;

/// A pluggable peer discovery mechanism.
///
/// The node attaches exactly one listener through
/// [`subscribe()`](Discovery::subscribe) before calling
/// [`start()`](Discovery::start), and calls [`stop()`](Discovery::stop)
/// before cancelling that subscription. After the returned
/// [`Subscription`] is cancelled the mechanism must not invoke the handler
/// again.
#[async_trait]
pub trait Discovery: Send + Sync + 'static {
    /// Tag identifying this mechanism (e.g. "bootstrap", "mdns").
    fn tag(&self) -> DiscoveryTag;

    /// Begin announcing peers.
    async fn start(&self) -> Result<()>;

    /// Stop announcing peers.
    async fn stop(&self) -> Result<()>;

    /// Register a handler for announced peers.
    ///
    /// Returning an error means the mechanism cannot deliver events; it is
    /// still started and stopped with the node but its announcements are
    /// never routed.
    fn subscribe(&self, handler: PeerHandler) -> Result<Subscription>;
}
