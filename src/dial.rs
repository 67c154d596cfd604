//! Auto-dial: drives connection attempts to known and discovered peers.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{future::BoxFuture, stream::FuturesUnordered, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn, Instrument};

use crate::events::EventBus;
use crate::peer::{Multiaddr, PeerId};
use crate::{Error, Result};

/// Establishes connections to peers.
pub trait Dialer: Send + Sync + 'static {
    /// Issue a connection request.
    ///
    /// The request is considered issued when this returns; the returned
    /// future resolves once the attempt completes. Implementations report
    /// failures through the future and never panic here.
    fn dial(&self, peer: PeerId, addresses: Vec<Multiaddr>) -> BoxFuture<'static, Result<()>>;

    /// Number of open connections.
    fn connection_count(&self) -> usize {
        0
    }

    /// Whether a connection to `peer` is already open.
    fn is_connected(&self, _peer: &PeerId) -> bool {
        false
    }
}

struct DialAttempt {
    peer: PeerId,
    fut: BoxFuture<'static, Result<()>>,
}

/// Cloneable handle for submitting dials to a running [`AutoDialer`].
#[derive(Clone)]
pub struct DialHandle {
    dialer: Arc<dyn Dialer>,
    tx: mpsc::UnboundedSender<DialAttempt>,
}

impl DialHandle {
    /// Issue a dial and hand its completion to the driver.
    ///
    /// Returns `false` without calling the dialer once the driver has shut
    /// down.
    pub fn dial(&self, peer: PeerId, addresses: Vec<Multiaddr>) -> bool {
        if self.tx.is_closed() {
            debug!(peer = %peer.fmt_short(), "dial driver stopped, dropping dial");
            return false;
        }
        debug!(peer = %peer.fmt_short(), addrs = addresses.len(), "dialing peer");
        let fut = self.dialer.dial(peer.clone(), addresses);
        self.tx.send(DialAttempt { peer, fut }).is_ok()
    }

    /// The underlying dialer.
    pub fn dialer(&self) -> &dyn Dialer {
        self.dialer.as_ref()
    }
}

/// Background task completing dial attempts for one node lifetime.
///
/// Failures are logged and published on the event bus. Shutting down
/// cancels every attempt still in flight.
pub struct AutoDialer {
    handle: DialHandle,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl AutoDialer {
    /// Spawn the driver task.
    pub fn spawn(dialer: Arc<dyn Dialer>, timeout: Duration, events: EventBus) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let span = tracing::debug_span!("dial_driver");
        let task = tokio::spawn(drive(rx, shutdown_rx, timeout, events).instrument(span));
        Self {
            handle: DialHandle { dialer, tx },
            shutdown_tx,
            task: Some(task),
        }
    }

    /// A handle for submitting dials.
    pub fn handle(&self) -> DialHandle {
        self.handle.clone()
    }

    /// Stop the driver, cancelling pending attempts.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("dial driver task failed: {e}");
            }
        }
    }
}

impl Drop for AutoDialer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn drive(
    mut rx: mpsc::UnboundedReceiver<DialAttempt>,
    mut shutdown_rx: broadcast::Receiver<()>,
    timeout: Duration,
    events: EventBus,
) {
    let mut inflight: FuturesUnordered<BoxFuture<'static, (PeerId, Result<()>)>> =
        FuturesUnordered::new();

    loop {
        let has_inflight = !inflight.is_empty();
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!(pending = inflight.len(), "dial driver shutting down");
                break;
            }

            Some((peer, res)) = inflight.next(), if has_inflight => {
                match res {
                    Ok(()) => debug!(peer = %peer.fmt_short(), "dial succeeded"),
                    Err(err) => {
                        let err = match err {
                            err @ Error::Dial { .. } => err,
                            other => Error::dial(peer, other),
                        };
                        warn!("{err}");
                        events.error(err);
                    }
                }
            }

            attempt = rx.recv() => match attempt {
                Some(DialAttempt { peer, fut }) => {
                    inflight.push(Box::pin(async move {
                        let res = match time::timeout(timeout, fut).await {
                            Ok(res) => res,
                            Err(_) => Err(Error::Timeout(timeout)),
                        };
                        (peer, res)
                    }));
                }
                None => break,
            },
        }
    }
}
