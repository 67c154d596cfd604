//! Static bootstrap list, announced on start and optionally on an interval.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Discovery, DiscoveryTag, PeerHandler, PeerListeners, Subscription};
use crate::config::MechanismConfig;
use crate::peer::DiscoveredPeer;
use crate::Result;

/// Announces a fixed set of peers.
///
/// On [`start()`](Discovery::start) every peer is announced once; with an
/// interval set they are announced again on every tick until stopped.
pub struct BootstrapDiscovery {
    peers: Vec<DiscoveredPeer>,
    interval: Option<Duration>,
    listeners: PeerListeners,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BootstrapDiscovery {
    /// Tag used by this mechanism.
    pub const TAG: &'static str = "bootstrap";

    /// Create a mechanism announcing `peers`.
    pub fn new<I>(peers: I) -> Self
    where
        I: IntoIterator<Item = DiscoveredPeer>,
    {
        Self {
            peers: peers.into_iter().collect(),
            interval: None,
            listeners: PeerListeners::new(),
            task: Mutex::new(None),
        }
    }

    /// Re-announce the list every `interval`.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Apply a configuration entry (currently its interval).
    pub fn with_config(mut self, config: &MechanismConfig) -> Self {
        if let Some(interval) = config.interval() {
            self.interval = Some(interval);
        }
        self
    }

    /// The configured peers.
    pub fn peers(&self) -> &[DiscoveredPeer] {
        &self.peers
    }
}

#[async_trait]
impl Discovery for BootstrapDiscovery {
    fn tag(&self) -> DiscoveryTag {
        DiscoveryTag::from(Self::TAG)
    }

    async fn start(&self) -> Result<()> {
        let mut task = self.task.lock();
        if task.is_some() {
            warn!("bootstrap discovery already started");
            return Ok(());
        }

        let peers = self.peers.clone();
        let listeners = self.listeners.clone();
        let interval = self.interval;

        *task = Some(tokio::spawn(async move {
            info!(peers = peers.len(), "bootstrap discovery started");
            announce(&listeners, &peers);

            let Some(period) = interval else {
                return;
            };
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                announce(&listeners, &peers);
            }
        }));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            debug!("bootstrap discovery stopped");
        }
        Ok(())
    }

    fn subscribe(&self, handler: PeerHandler) -> Result<Subscription> {
        Ok(self.listeners.subscribe(handler))
    }
}

fn announce(listeners: &PeerListeners, peers: &[DiscoveredPeer]) {
    for peer in peers {
        debug!(peer = %peer.id.fmt_short(), source = BootstrapDiscovery::TAG, "announcing peer");
        listeners.emit(peer);
    }
}
