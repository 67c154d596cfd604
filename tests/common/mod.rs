#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use node_discovery::{
    DiscoveredPeer, Dialer, Discovery, DiscoveryFactory, DiscoveryTag, Error, MechanismConfig,
    Multiaddr, NodeEvent, PeerHandler, PeerId, PeerListeners, Result, Subscription, Transport,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};

/// Shared, ordered record of calls made across mocks.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

pub fn peer(byte: u8) -> PeerId {
    PeerId::from_bytes([byte; 32])
}

pub fn addr(s: &str) -> Multiaddr {
    s.parse().expect("valid multiaddr")
}

/// A controllable discovery mechanism.
pub struct MockDiscovery {
    tag: String,
    listeners: PeerListeners,
    starts: AtomicUsize,
    stops: AtomicUsize,
    journal: Journal,
    fail_start: bool,
    fail_stop: bool,
    refuse_subscribe: bool,
    hang_start: bool,
    start_gate: Option<Arc<Notify>>,
}

impl MockDiscovery {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            listeners: PeerListeners::new(),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            journal: Journal::default(),
            fail_start: false,
            fail_stop: false,
            refuse_subscribe: false,
            hang_start: false,
            start_gate: None,
        }
    }

    pub fn journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn refusing_subscribe(mut self) -> Self {
        self.refuse_subscribe = true;
        self
    }

    pub fn hanging_start(mut self) -> Self {
        self.hang_start = true;
        self
    }

    pub fn gated_start(mut self, gate: Arc<Notify>) -> Self {
        self.start_gate = Some(gate);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Announce a peer to whoever is attached, started or not.
    pub fn emit(&self, peer: DiscoveredPeer) {
        self.listeners.emit(&peer);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    fn tag(&self) -> DiscoveryTag {
        DiscoveryTag::from(self.tag.as_str())
    }

    async fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("start:{}", self.tag));
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }
        if self.hang_start {
            std::future::pending::<()>().await;
        }
        if self.fail_start {
            return Err(Error::mechanism_start(self.tag(), "listener socket in use"));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.journal.record(format!("stop:{}", self.tag));
        if self.fail_stop {
            return Err(Error::mechanism_stop(self.tag(), "already closed"));
        }
        Ok(())
    }

    fn subscribe(&self, handler: PeerHandler) -> Result<Subscription> {
        if self.refuse_subscribe {
            return Err(Error::subscribe(self.tag(), "no event support"));
        }
        Ok(self.listeners.subscribe(handler))
    }
}

/// Dialer recording every request it is given.
#[derive(Default)]
pub struct RecordingDialer {
    dials: Mutex<Vec<(PeerId, Vec<Multiaddr>)>>,
    journal: Journal,
    fail: bool,
    connections: AtomicUsize,
}

impl RecordingDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_connections(self, n: usize) -> Self {
        self.connections.store(n, Ordering::SeqCst);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn dials(&self) -> Vec<(PeerId, Vec<Multiaddr>)> {
        self.dials.lock().clone()
    }
}

impl Dialer for RecordingDialer {
    fn dial(&self, peer: PeerId, addresses: Vec<Multiaddr>) -> BoxFuture<'static, Result<()>> {
        self.journal.record(format!("dial:{}", peer.fmt_short()));
        self.dials.lock().push((peer.clone(), addresses));
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(Error::dial(peer, "connection refused"))
            } else {
                Ok(())
            }
        })
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Factory building [`MockDiscovery`] instances on demand.
pub struct MockFactory {
    tag: &'static str,
    default_on: bool,
    created: AtomicUsize,
    last: Mutex<Option<Arc<MockDiscovery>>>,
}

impl MockFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<Arc<MockDiscovery>> {
        self.last.lock().clone()
    }
}

impl DiscoveryFactory for MockFactory {
    fn tag(&self) -> DiscoveryTag {
        DiscoveryTag::from(self.tag)
    }

    fn enabled_by_default(&self) -> bool {
        self.default_on
    }

    fn create(&self, _config: &MechanismConfig) -> Arc<dyn Discovery> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let discovery = MockDiscovery::new(self.tag).arc();
        *self.last.lock() = Some(Arc::clone(&discovery));
        discovery
    }
}

/// Transport contributing a [`MockDiscovery`].
pub struct MockTransport {
    factory: MockFactory,
}

impl MockTransport {
    pub fn new(tag: &'static str) -> Arc<Self> {
        Self::with_default(tag, false)
    }

    pub fn with_default(tag: &'static str, default_on: bool) -> Arc<Self> {
        Arc::new(Self {
            factory: MockFactory {
                tag,
                default_on,
                created: AtomicUsize::new(0),
                last: Mutex::new(None),
            },
        })
    }

    pub fn factory(&self) -> &MockFactory {
        &self.factory
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
    }

    fn discovery(&self) -> Option<&dyn DiscoveryFactory> {
        Some(&self.factory)
    }
}

/// Drain the discovery events currently buffered.
pub fn drain_discoveries(rx: &mut broadcast::Receiver<NodeEvent>) -> Vec<PeerId> {
    let mut peers = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Some(peer) = event.discovered_peer() {
            peers.push(peer.clone());
        }
    }
    peers
}

/// Wait for the next error event.
pub async fn next_error(rx: &mut broadcast::Receiver<NodeEvent>) -> Arc<Error> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(NodeEvent::Error(err)) => return err,
                Ok(_) => continue,
                Err(e) => panic!("event bus closed: {e}"),
            }
        }
    })
    .await
    .expect("error event")
}
