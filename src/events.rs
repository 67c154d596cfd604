//! Node-wide event bus.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::peer::{Multiaddr, PeerId};
use crate::Error;

/// Notification published on the node event bus.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// `peer:discovery`: a peer other than the local node was discovered.
    PeerDiscovery {
        /// The discovered peer.
        peer: PeerId,
        /// Every address the address book holds for it after the merge.
        addresses: Vec<Multiaddr>,
    },
    /// A non-fatal failure (dial, mechanism start/stop, listener attach).
    Error(Arc<Error>),
}

impl NodeEvent {
    /// The discovered peer, if this is a discovery event.
    pub fn discovered_peer(&self) -> Option<&PeerId> {
        match self {
            Self::PeerDiscovery { peer, .. } => Some(peer),
            Self::Error(_) => None,
        }
    }
}

/// Broadcast bus delivering [`NodeEvent`]s to every subscriber.
///
/// Publishing never waits on subscribers; a slow subscriber lags without
/// affecting the others.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NodeEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a `peer:discovery` notification.
    pub fn peer_discovered(&self, peer: PeerId, addresses: Vec<Multiaddr>) {
        self.publish(NodeEvent::PeerDiscovery { peer, addresses });
    }

    /// Publish a non-fatal error.
    pub fn error(&self, error: Error) {
        self.publish(NodeEvent::Error(Arc::new(error)));
    }

    /// Publish an event.
    pub fn publish(&self, event: NodeEvent) {
        if self.tx.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }

    /// Future events as a stream; lagged gaps are skipped.
    pub fn stream(&self) -> impl Stream<Item = NodeEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|msg| async move { msg.ok() })
    }
}
