//! Address book: known addresses per peer.

use dashmap::DashMap;

use crate::peer::{Multiaddr, PeerId};

/// Mapping from peer id to its known addresses.
///
/// Implementations must tolerate concurrent `merge` calls from several
/// discovery mechanisms at once.
pub trait AddressBook: Send + Sync + 'static {
    /// Known addresses for a peer, empty if unknown.
    fn get(&self, peer: &PeerId) -> Vec<Multiaddr>;

    /// Union `addresses` into the peer's entry and return the merged set.
    fn merge(&self, peer: &PeerId, addresses: &[Multiaddr]) -> Vec<Multiaddr>;

    /// Every peer with its addresses.
    fn list(&self) -> Vec<(PeerId, Vec<Multiaddr>)>;
}

/// In-memory [`AddressBook`] backed by a concurrent map.
///
/// Addresses keep their first-seen order.
#[derive(Debug, Default)]
pub struct MemoryAddressBook {
    peers: DashMap<PeerId, Vec<Multiaddr>>,
}

impl MemoryAddressBook {
    /// Create an empty address book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a peer's addresses.
    pub fn set(&self, peer: PeerId, addresses: Vec<Multiaddr>) {
        let mut deduped: Vec<Multiaddr> = Vec::with_capacity(addresses.len());
        for addr in addresses {
            if !deduped.contains(&addr) {
                deduped.push(addr);
            }
        }
        self.peers.insert(peer, deduped);
    }

    /// Forget a peer.
    pub fn remove(&self, peer: &PeerId) -> Option<Vec<Multiaddr>> {
        self.peers.remove(peer).map(|(_, addrs)| addrs)
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peer is known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl AddressBook for MemoryAddressBook {
    fn get(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.peers
            .get(peer)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn merge(&self, peer: &PeerId, addresses: &[Multiaddr]) -> Vec<Multiaddr> {
        let mut entry = self.peers.entry(peer.clone()).or_default();
        for addr in addresses {
            if !entry.contains(addr) {
                entry.push(addr.clone());
            }
        }
        entry.value().clone()
    }

    fn list(&self) -> Vec<(PeerId, Vec<Multiaddr>)> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
