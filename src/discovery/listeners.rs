//! Listener bookkeeping shared by discovery mechanisms.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::PeerHandler;
use crate::peer::DiscoveredPeer;

/// Handle for an attached listener.
///
/// [`cancel()`](Subscription::cancel) detaches the listener; dropping the
/// handle does the same.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Wrap a detach action.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to detach.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Detach the listener. Once this returns the handler is not invoked again.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    handlers: BTreeMap<u64, PeerHandler>,
}

/// Set of attached [`PeerHandler`]s.
///
/// `emit` holds a read lock while handlers run and cancelling takes the
/// write lock, so a handler never runs after its subscription is cancelled.
#[derive(Clone, Default)]
pub struct PeerListeners {
    inner: Arc<RwLock<Inner>>,
}

impl PeerListeners {
    /// Create an empty listener set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler.
    pub fn subscribe(&self, handler: PeerHandler) -> Subscription {
        let id = {
            let mut inner = self.inner.write();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.handlers.insert(id, handler);
            id
        };
        let weak: Weak<RwLock<Inner>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.write().handlers.remove(&id);
            }
        })
    }

    /// Deliver a peer to every attached handler.
    ///
    /// A handler may emit on the same set again (e.g. a dialer feeding peer
    /// exchange synchronously) even while a subscriber is waiting to attach.
    pub fn emit(&self, peer: &DiscoveredPeer) {
        let inner = self.inner.read_recursive();
        for handler in inner.handlers.values() {
            handler(peer.clone());
        }
    }

    /// Number of attached handlers.
    pub fn len(&self) -> usize {
        self.inner.read().handlers.len()
    }

    /// Whether no handler is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PeerListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerListeners")
            .field("handlers", &self.len())
            .finish()
    }
}
