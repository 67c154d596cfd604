//! Peer identities, addresses, and discovery announcements.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque identifier of a peer.
///
/// Derived from a key pair elsewhere; here only the bytes matter. Two ids
/// are equal iff their bytes are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(Arc<[u8]>);

impl PeerId {
    /// Create a peer id from raw bytes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    /// Raw bytes of this id.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short hex prefix for log lines.
    pub fn fmt_short(&self) -> String {
        encode_hex(&self.0[..self.0.len().min(5)])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.fmt_short())
    }
}

impl FromStr for PeerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode_hex(s)
            .map(Self::from_bytes)
            .ok_or_else(|| Error::InvalidPeerId(s.to_string()))
    }
}

impl TryFrom<String> for PeerId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.to_string()
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.is_empty() || s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// A network address in multiaddr text form, e.g. `/ip4/10.0.0.1/tcp/4001`.
///
/// Only the outer shape is checked; protocol semantics belong to the
/// transports.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Multiaddr(Arc<str>);

impl Multiaddr {
    /// The textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({})", self.0)
    }
}

impl FromStr for Multiaddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidMultiaddr {
            addr: s.to_string(),
            reason,
        };
        let rest = s.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        if rest.is_empty() {
            return Err(invalid("no protocol components"));
        }
        if rest.split('/').any(str::is_empty) {
            return Err(invalid("empty component"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }
        Ok(Self(Arc::from(s)))
    }
}

impl TryFrom<String> for Multiaddr {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Multiaddr> for String {
    fn from(addr: Multiaddr) -> Self {
        addr.0.to_string()
    }
}

/// A peer as announced by a discovery mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// The announced peer.
    pub id: PeerId,
    /// Addresses the mechanism saw for it, possibly none.
    pub addresses: Vec<Multiaddr>,
}

impl DiscoveredPeer {
    /// Create an announcement without addresses.
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            addresses: Vec::new(),
        }
    }

    /// Attach addresses to the announcement.
    pub fn with_addresses<I>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = Multiaddr>,
    {
        self.addresses.extend(addresses);
        self
    }
}
