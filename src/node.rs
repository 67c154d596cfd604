//! Node lifecycle: starts and stops discovery and auto-dial together.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::Stream;
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time;
use tracing::{debug, info, warn, Instrument};

use crate::address_book::{AddressBook, MemoryAddressBook};
use crate::config::NodeConfig;
use crate::dial::{AutoDialer, DialHandle, Dialer};
use crate::discovery::{Discovery, DiscoveryRegistry, DiscoveryRouter, DiscoveryTag, Subscription};
use crate::events::{EventBus, NodeEvent};
use crate::peer::PeerId;
use crate::transport::Transport;
use crate::{Error, Result};

/// Lifecycle state of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLifecycleState {
    /// Not running. Initial and terminal state.
    Stopped,
    /// [`Node::start`] is in progress.
    Starting,
    /// Discovery is running.
    Started,
    /// [`Node::stop`] is in progress.
    Stopping,
}

/// Builder for a [`Node`].
pub struct NodeBuilder {
    local_peer: PeerId,
    dialer: Arc<dyn Dialer>,
    config: NodeConfig,
    address_book: Option<Arc<dyn AddressBook>>,
    discoveries: Vec<Arc<dyn Discovery>>,
    transports: Vec<Arc<dyn Transport>>,
}

impl NodeBuilder {
    /// Set the node configuration.
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a shared address book. Defaults to an empty [`MemoryAddressBook`].
    pub fn address_book(mut self, address_book: Arc<dyn AddressBook>) -> Self {
        self.address_book = Some(address_book);
        self
    }

    /// Add an explicitly configured discovery mechanism.
    ///
    /// Explicit mechanisms run whenever the node runs, regardless of their
    /// configuration entry.
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discoveries.push(discovery);
        self
    }

    /// Add a transport, which may contribute a discovery mechanism.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Build the node in the [`Stopped`](NodeLifecycleState::Stopped) state.
    pub fn build(self) -> Node {
        let (state, _) = watch::channel(NodeLifecycleState::Stopped);
        Node {
            inner: Arc::new(NodeInner {
                events: EventBus::new(self.config.event_capacity),
                local_peer: self.local_peer,
                dialer: self.dialer,
                config: self.config,
                address_book: self
                    .address_book
                    .unwrap_or_else(|| Arc::new(MemoryAddressBook::new())),
                discoveries: self.discoveries,
                transports: self.transports,
                state,
                running: Mutex::new(None),
                active: RwLock::new(BTreeMap::new()),
            }),
        }
    }
}

/// Everything that lives between one start and the matching stop.
struct Running {
    registry: DiscoveryRegistry,
    router: Arc<DiscoveryRouter>,
    subscriptions: BTreeMap<DiscoveryTag, Subscription>,
    dialer: AutoDialer,
}

/// A peer-to-peer node's discovery core.
///
/// `start()` builds the active mechanism set, announces and dials peers
/// already in the address book, attaches the router, and starts every
/// mechanism. `stop()` reverses that. Start and stop are serialized; a call
/// made while the other is in progress waits for it to finish.
///
/// Each transition runs on its own task and completes even if the caller
/// stops waiting for it, so dropping a pending `start()` still leaves the
/// node `Started` and a later `stop()` tears it down.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use node_discovery::{BootstrapDiscovery, DiscoveredPeer, Dialer, Multiaddr, Node, PeerId};
/// # async fn run(dialer: Arc<dyn Dialer>) -> node_discovery::Result<()> {
/// let addr: Multiaddr = "/ip4/10.0.0.2/tcp/4001".parse()?;
/// let seed = DiscoveredPeer::new(PeerId::from_bytes([2; 32])).with_addresses([addr]);
/// let node = Node::builder(PeerId::from_bytes([1; 32]), dialer)
///     .discovery(Arc::new(BootstrapDiscovery::new([seed])))
///     .build();
/// let mut events = node.subscribe();
/// node.start().await?;
/// while let Ok(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// node.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    local_peer: PeerId,
    config: NodeConfig,
    dialer: Arc<dyn Dialer>,
    address_book: Arc<dyn AddressBook>,
    discoveries: Vec<Arc<dyn Discovery>>,
    transports: Vec<Arc<dyn Transport>>,
    events: EventBus,
    state: watch::Sender<NodeLifecycleState>,
    running: Mutex<Option<Running>>,
    // readable without waiting on a transition; only populated while Started
    active: RwLock<BTreeMap<DiscoveryTag, Arc<dyn Discovery>>>,
}

impl Node {
    /// Start building a node identified by `local_peer`.
    pub fn builder(local_peer: PeerId, dialer: Arc<dyn Dialer>) -> NodeBuilder {
        NodeBuilder {
            local_peer,
            dialer,
            config: NodeConfig::default(),
            address_book: None,
            discoveries: Vec::new(),
            transports: Vec::new(),
        }
    }

    /// The local peer id.
    pub fn local_peer(&self) -> &PeerId {
        &self.inner.local_peer
    }

    /// The node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// The address book shared by auto-dial and discovery.
    pub fn address_book(&self) -> &Arc<dyn AddressBook> {
        &self.inner.address_book
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeLifecycleState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<NodeLifecycleState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to node events.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.inner.events.subscribe()
    }

    /// Node events as a stream.
    pub fn events(&self) -> impl Stream<Item = NodeEvent> + Send + 'static {
        self.inner.events.stream()
    }

    /// Tags of the running mechanisms; empty unless started.
    ///
    /// Never waits for a start or stop in progress.
    pub fn list_active_mechanisms(&self) -> BTreeSet<DiscoveryTag> {
        self.inner.active.read().keys().cloned().collect()
    }

    /// A running mechanism by tag.
    pub fn discovery(&self, tag: &str) -> Option<Arc<dyn Discovery>> {
        self.inner.active.read().get(tag).cloned()
    }

    /// Start discovery and auto-dial.
    ///
    /// Returns once the node is [`Started`](NodeLifecycleState::Started).
    /// Starting a started node does nothing. Only configuration errors are
    /// returned, in which case the node stays stopped; mechanism and dial
    /// failures are logged and published as [`NodeEvent::Error`].
    pub async fn start(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let span = tracing::debug_span!("node_start", local = %inner.local_peer.fmt_short());
        detached(async move { inner.start().await }.instrument(span)).await
    }

    /// Stop discovery and auto-dial.
    ///
    /// Returns once the node is [`Stopped`](NodeLifecycleState::Stopped).
    /// Stopping a stopped node does nothing. Each mechanism is stopped and
    /// then detached; a failing mechanism does not prevent the others from
    /// stopping. Pending dials are cancelled.
    pub async fn stop(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let span = tracing::debug_span!("node_stop", local = %inner.local_peer.fmt_short());
        detached(async move { inner.stop().await }.instrument(span)).await
    }
}

/// Run a lifecycle transition to completion on its own task.
async fn detached<F>(transition: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(transition).await {
        Ok(res) => res,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(Error::Lifecycle(err.to_string())),
    }
}

impl NodeInner {
    async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("node already started");
            return Ok(());
        }

        let started = self.start_inner().await?;
        *self.active.write() = started
            .registry
            .iter()
            .map(|(tag, discovery)| (tag.clone(), Arc::clone(discovery)))
            .collect();
        let mechanisms = started.registry.len();
        *running = Some(started);

        self.state.send_replace(NodeLifecycleState::Started);
        info!(mechanisms, "node started");
        Ok(())
    }

    async fn start_inner(&self) -> Result<Running> {
        self.state.send_replace(NodeLifecycleState::Starting);

        let registry = match DiscoveryRegistry::build(
            &self.discoveries,
            &self.transports,
            &self.config.peer_discovery,
        ) {
            Ok(registry) => registry,
            Err(err) => {
                warn!("failed to build discovery set: {err}");
                self.state.send_replace(NodeLifecycleState::Stopped);
                return Err(err);
            }
        };

        let dialer = AutoDialer::spawn(
            Arc::clone(&self.dialer),
            self.config.dial_timeout(),
            self.events.clone(),
        );
        let dials = self
            .config
            .peer_discovery
            .auto_dial
            .then(|| dialer.handle());

        self.announce_known_peers(dials.as_ref());

        let router = Arc::new(DiscoveryRouter::new(
            self.local_peer.clone(),
            Arc::clone(&self.address_book),
            self.events.clone(),
            dials,
            self.config.peer_discovery.min_connections,
        ));

        let mut subscriptions = BTreeMap::new();
        for (tag, discovery) in registry.iter() {
            match discovery.subscribe(router.handler(tag.clone())) {
                Ok(subscription) => {
                    subscriptions.insert(tag.clone(), subscription);
                }
                Err(err) => self.report(subscribe_failure(tag, err)),
            }
        }

        let timeout = self.config.mechanism_timeout();
        let starts = registry.iter().map(|(tag, discovery)| async move {
            match time::timeout(timeout, discovery.start()).await {
                Ok(Ok(())) => {
                    debug!(tag = %tag, "discovery started");
                    None
                }
                Ok(Err(err)) => Some(start_failure(tag, err)),
                Err(_) => Some(Error::mechanism_start(tag.clone(), Error::Timeout(timeout))),
            }
        });
        for err in join_all(starts).await.into_iter().flatten() {
            self.report(err);
        }

        Ok(Running {
            registry,
            router,
            subscriptions,
            dialer,
        })
    }

    /// Publish and dial every peer already in the address book.
    fn announce_known_peers(&self, dials: Option<&DialHandle>) {
        for (peer, addresses) in self.address_book.list() {
            if peer == self.local_peer {
                continue;
            }
            self.events.peer_discovered(peer.clone(), addresses.clone());
            let Some(dials) = dials else {
                continue;
            };
            if dials.dialer().is_connected(&peer) {
                continue;
            }
            dials.dial(peer, addresses);
        }
    }

    async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(current) = running.take() else {
            debug!("node not started");
            return Ok(());
        };
        self.stop_inner(current).await;
        Ok(())
    }

    async fn stop_inner(&self, running: Running) {
        let Running {
            mut registry,
            router,
            mut subscriptions,
            dialer,
        } = running;
        self.active.write().clear();
        self.state.send_replace(NodeLifecycleState::Stopping);

        let timeout = self.config.mechanism_timeout();
        let stops = registry
            .iter()
            .map(|(tag, discovery)| (tag, discovery, subscriptions.remove(tag)))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(tag, discovery, subscription)| async move {
                let res = match time::timeout(timeout, discovery.stop()).await {
                    Ok(Ok(())) => {
                        debug!(tag = %tag, "discovery stopped");
                        None
                    }
                    Ok(Err(err)) => Some(stop_failure(tag, err)),
                    Err(_) => Some(Error::mechanism_stop(tag.clone(), Error::Timeout(timeout))),
                };
                if let Some(subscription) = subscription {
                    subscription.cancel();
                }
                res
            });
        for err in join_all(stops).await.into_iter().flatten() {
            self.report(err);
        }

        router.close();
        dialer.shutdown().await;
        registry.clear();

        self.state.send_replace(NodeLifecycleState::Stopped);
        info!("node stopped");
    }

    fn report(&self, err: Error) {
        warn!("{err}");
        self.events.error(err);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("local_peer", &self.inner.local_peer)
            .field("state", &self.state())
            .finish()
    }
}

fn subscribe_failure(tag: &DiscoveryTag, err: Error) -> Error {
    match err {
        err @ Error::Subscribe { .. } => err,
        other => Error::subscribe(tag.clone(), other),
    }
}

fn start_failure(tag: &DiscoveryTag, err: Error) -> Error {
    match err {
        err @ Error::MechanismStart { .. } => err,
        other => Error::mechanism_start(tag.clone(), other),
    }
}

fn stop_failure(tag: &DiscoveryTag, err: Error) -> Error {
    match err {
        err @ Error::MechanismStop { .. } => err,
        other => Error::mechanism_stop(tag.clone(), other),
    }
}
