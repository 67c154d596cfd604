//! Routes mechanism announcements to the node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use super::{DiscoveryTag, PeerHandler};
use crate::address_book::AddressBook;
use crate::dial::DialHandle;
use crate::events::EventBus;
use crate::peer::{DiscoveredPeer, Multiaddr, PeerId};

/// The single listener attached to every active mechanism.
///
/// Drops announcements of the local peer, merges announced addresses into
/// the address book, publishes `peer:discovery`, and triggers auto-dial.
/// One router serves one node lifetime; once [`close()`](Self::close) is
/// called it ignores everything.
pub struct DiscoveryRouter {
    local_peer: PeerId,
    address_book: Arc<dyn AddressBook>,
    events: EventBus,
    dials: Option<DialHandle>,
    min_connections: usize,
    closed: AtomicBool,
}

impl DiscoveryRouter {
    /// Create a router.
    ///
    /// `dials` is `None` when auto-dial is disabled.
    pub fn new(
        local_peer: PeerId,
        address_book: Arc<dyn AddressBook>,
        events: EventBus,
        dials: Option<DialHandle>,
        min_connections: usize,
    ) -> Self {
        Self {
            local_peer,
            address_book,
            events,
            dials,
            min_connections,
            closed: AtomicBool::new(false),
        }
    }

    /// Handle one announcement.
    pub fn on_peer_found(&self, peer: DiscoveredPeer) {
        if self.closed.load(Ordering::Acquire) {
            trace!(peer = %peer.id.fmt_short(), "router closed, dropping announcement");
            return;
        }
        if peer.id == self.local_peer {
            trace!("ignoring self discovery");
            return;
        }

        let addresses = if peer.addresses.is_empty() {
            self.address_book.get(&peer.id)
        } else {
            self.address_book.merge(&peer.id, &peer.addresses)
        };

        debug!(peer = %peer.id.fmt_short(), addrs = addresses.len(), "discovered peer");
        self.events.peer_discovered(peer.id.clone(), addresses.clone());
        self.maybe_dial(peer.id, addresses);
    }

    fn maybe_dial(&self, peer: PeerId, addresses: Vec<Multiaddr>) {
        let Some(dials) = &self.dials else {
            return;
        };
        let dialer = dials.dialer();
        if dialer.is_connected(&peer) {
            trace!(peer = %peer.fmt_short(), "already connected");
            return;
        }
        if dialer.connection_count() >= self.min_connections {
            return;
        }
        dials.dial(peer, addresses);
    }

    /// Listener to attach to the mechanism tagged `tag`.
    pub fn handler(self: &Arc<Self>, tag: DiscoveryTag) -> PeerHandler {
        let router = Arc::clone(self);
        Arc::new(move |peer: DiscoveredPeer| {
            trace!(tag = %tag, peer = %peer.id.fmt_short(), "announcement");
            router.on_peer_found(peer);
        })
    }

    /// Stop routing. Announcements arriving afterwards are dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close()`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_book::MemoryAddressBook;
    use crate::events::NodeEvent;

    fn setup() -> (
        Arc<DiscoveryRouter>,
        Arc<MemoryAddressBook>,
        tokio::sync::broadcast::Receiver<NodeEvent>,
        PeerId,
    ) {
        let local = PeerId::from_bytes([1; 32]);
        let book = Arc::new(MemoryAddressBook::new());
        let events = EventBus::new(16);
        let rx = events.subscribe();
        let router = Arc::new(DiscoveryRouter::new(
            local.clone(),
            book.clone(),
            events,
            None,
            0,
        ));
        (router, book, rx, local)
    }

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn self_discovery_is_silent() {
        let (router, book, mut rx, local) = setup();
        router.on_peer_found(
            DiscoveredPeer::new(local).with_addresses([addr("/ip4/127.0.0.1/tcp/1")]),
        );
        assert!(rx.try_recv().is_err());
        assert!(book.is_empty());
    }

    #[test]
    fn announcement_merges_and_publishes() {
        let (router, book, mut rx, _) = setup();
        let remote = PeerId::from_bytes([2; 32]);
        let b = addr("/ip4/10.0.0.2/tcp/4001");

        router.on_peer_found(DiscoveredPeer::new(remote.clone()).with_addresses([b.clone()]));

        match rx.try_recv().unwrap() {
            NodeEvent::PeerDiscovery { peer, addresses } => {
                assert_eq!(peer, remote);
                assert_eq!(addresses, vec![b.clone()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(book.get(&remote), vec![b]);
    }

    #[test]
    fn every_announcement_is_published() {
        let (router, _book, mut rx, _) = setup();
        let remote = PeerId::from_bytes([3; 32]);
        let handler = router.handler(DiscoveryTag::from("mock"));

        handler(DiscoveredPeer::new(remote.clone()));
        handler(DiscoveredPeer::new(remote.clone()));

        assert_eq!(rx.try_recv().unwrap().discovered_peer(), Some(&remote));
        assert_eq!(rx.try_recv().unwrap().discovered_peer(), Some(&remote));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn address_less_announcement_reports_known_addresses() {
        let (router, book, mut rx, _) = setup();
        let remote = PeerId::from_bytes([4; 32]);
        let known = addr("/ip4/10.0.0.4/tcp/4001");
        book.set(remote.clone(), vec![known.clone()]);

        router.on_peer_found(DiscoveredPeer::new(remote));

        match rx.try_recv().unwrap() {
            NodeEvent::PeerDiscovery { addresses, .. } => assert_eq!(addresses, vec![known]),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn closed_router_drops_everything() {
        let (router, book, mut rx, _) = setup();
        router.close();
        assert!(router.is_closed());
        router.on_peer_found(
            DiscoveredPeer::new(PeerId::from_bytes([5; 32]))
                .with_addresses([addr("/ip4/10.0.0.5/tcp/1")]),
        );
        assert!(rx.try_recv().is_err());
        assert!(book.is_empty());
    }
}
