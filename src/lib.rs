//! Discovery orchestration and auto-dial for modular peer-to-peer nodes.
//!
//! A [`Node`] assembles its discovery mechanisms from explicit configuration
//! and from the transports it runs, starts and stops them with its own
//! lifecycle, routes their announcements onto a node-wide event bus (never
//! reporting the local peer), and dials peers it already knows on start.

#![deny(missing_docs)]

pub mod address_book;
pub mod config;
pub mod dial;
pub mod discovery;
pub mod error;
pub mod events;
pub mod node;
pub mod peer;
pub mod transport;

// Re-export key types
pub use address_book::{AddressBook, MemoryAddressBook};
pub use config::{MechanismConfig, MechanismSetting, NodeConfig, PeerDiscoveryConfig};
pub use dial::Dialer;
pub use discovery::{
    BootstrapDiscovery, Discovery, DiscoveryTag, PeerExchangeDiscovery, PeerHandler,
    PeerListeners, Subscription,
};
pub use error::{Error, Result};
pub use events::NodeEvent;
pub use node::{Node, NodeBuilder, NodeLifecycleState};
pub use peer::{DiscoveredPeer, Multiaddr, PeerId};
pub use transport::{DiscoveryFactory, Transport};
