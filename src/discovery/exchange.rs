//! Peer exchange: peers learned from other peers.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::trace;

use super::{Discovery, DiscoveryTag, PeerHandler, PeerListeners, Subscription};
use crate::peer::DiscoveredPeer;
use crate::Result;

/// Forwards peers ingested by other protocols (e.g. identify or gossip).
///
/// Ingested peers are announced only while the mechanism is started and are
/// dropped otherwise.
#[derive(Debug, Default)]
pub struct PeerExchangeDiscovery {
    listeners: PeerListeners,
    running: AtomicBool,
}

impl PeerExchangeDiscovery {
    /// Tag used by this mechanism.
    pub const TAG: &'static str = "peer-exchange";

    /// Create a stopped peer-exchange mechanism.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest peers learned from other peers.
    pub fn ingest_peers<I>(&self, peers: I)
    where
        I: IntoIterator<Item = DiscoveredPeer>,
    {
        if !self.running.load(Ordering::Acquire) {
            trace!("peer exchange stopped, dropping ingested peers");
            return;
        }
        for peer in peers {
            self.listeners.emit(&peer);
        }
    }

    /// Whether the mechanism is started.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Discovery for PeerExchangeDiscovery {
    fn tag(&self) -> DiscoveryTag {
        DiscoveryTag::from(Self::TAG)
    }

    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }

    fn subscribe(&self, handler: PeerHandler) -> Result<Subscription> {
        Ok(self.listeners.subscribe(handler))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;
    use crate::peer::PeerId;

    #[tokio::test]
    async fn forwards_only_while_running() {
        let exchange = PeerExchangeDiscovery::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _sub = exchange
            .subscribe(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        let peer = || DiscoveredPeer::new(PeerId::from_bytes([7; 32]));

        exchange.ingest_peers([peer()]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        exchange.start().await.unwrap();
        assert!(exchange.is_running());
        exchange.ingest_peers([peer(), peer()]);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        exchange.stop().await.unwrap();
        exchange.ingest_peers([peer()]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
