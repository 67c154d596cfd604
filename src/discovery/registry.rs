//! Active set of discovery mechanisms for one node lifetime.

use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::{Discovery, DiscoveryTag};
use crate::config::{MechanismConfig, PeerDiscoveryConfig};
use crate::transport::Transport;
use crate::{Error, Result};

/// The mechanisms a node runs between one start and the matching stop.
///
/// Built once per start from explicit mechanisms plus enabled
/// transport-contributed ones. Membership is fixed after the build.
#[derive(Default)]
pub struct DiscoveryRegistry {
    mechanisms: BTreeMap<DiscoveryTag, Arc<dyn Discovery>>,
}

impl DiscoveryRegistry {
    /// Assemble the active set.
    ///
    /// Explicit mechanisms are always included. A transport's mechanism is
    /// included when its configuration entry enables it, or when it has no
    /// setting and declares itself enabled by default; otherwise its factory
    /// is never called. Fails with [`Error::DuplicateTag`] if two included
    /// mechanisms share a tag.
    pub fn build(
        explicit: &[Arc<dyn Discovery>],
        transports: &[Arc<dyn Transport>],
        config: &PeerDiscoveryConfig,
    ) -> Result<Self> {
        let mut mechanisms: BTreeMap<DiscoveryTag, Arc<dyn Discovery>> = BTreeMap::new();

        for discovery in explicit {
            let tag = discovery.tag();
            match mechanisms.entry(tag) {
                Entry::Occupied(e) => return Err(Error::DuplicateTag(e.key().clone())),
                Entry::Vacant(e) => {
                    debug!(tag = %e.key(), "adding configured discovery");
                    e.insert(Arc::clone(discovery));
                }
            }
        }

        for transport in transports {
            let Some(factory) = transport.discovery() else {
                continue;
            };
            let tag = factory.tag();
            let setting = config.setting(&tag);
            if !setting.includes(factory.enabled_by_default()) {
                trace!(
                    tag = %tag,
                    transport = transport.name(),
                    ?setting,
                    "transport discovery not enabled"
                );
                continue;
            }
            match mechanisms.entry(tag) {
                Entry::Occupied(e) => return Err(Error::DuplicateTag(e.key().clone())),
                Entry::Vacant(e) => {
                    let default_entry = MechanismConfig::default();
                    let entry = config.mechanism(e.key()).unwrap_or(&default_entry);
                    debug!(
                        tag = %e.key(),
                        transport = transport.name(),
                        "adding transport discovery"
                    );
                    e.insert(factory.create(entry));
                }
            }
        }

        Ok(Self { mechanisms })
    }

    /// Look up a mechanism by tag.
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Discovery>> {
        self.mechanisms.get(tag)
    }

    /// Whether a mechanism with this tag is active.
    pub fn contains(&self, tag: &str) -> bool {
        self.mechanisms.contains_key(tag)
    }

    /// Tags of all active mechanisms.
    pub fn tags(&self) -> BTreeSet<DiscoveryTag> {
        self.mechanisms.keys().cloned().collect()
    }

    /// Iterate over the active mechanisms.
    pub fn iter(&self) -> impl Iterator<Item = (&DiscoveryTag, &Arc<dyn Discovery>)> {
        self.mechanisms.iter()
    }

    /// Number of active mechanisms.
    pub fn len(&self) -> usize {
        self.mechanisms.len()
    }

    /// Whether no mechanism is active.
    pub fn is_empty(&self) -> bool {
        self.mechanisms.is_empty()
    }

    /// Release every mechanism. Only call once none is running.
    pub fn clear(&mut self) {
        self.mechanisms.clear();
    }
}

impl fmt::Debug for DiscoveryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.mechanisms.keys()).finish()
    }
}
