//! Error types for node-discovery.

use std::time::Duration;

use crate::discovery::DiscoveryTag;
use crate::peer::PeerId;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two discovery mechanisms share a tag.
    #[error("duplicate discovery tag `{0}`")]
    DuplicateTag(DiscoveryTag),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// A discovery mechanism failed to start.
    #[error("discovery `{tag}` failed to start: {reason}")]
    MechanismStart {
        /// Tag of the failing mechanism.
        tag: DiscoveryTag,
        /// Failure description.
        reason: String,
    },

    /// A discovery mechanism failed to stop.
    #[error("discovery `{tag}` failed to stop: {reason}")]
    MechanismStop {
        /// Tag of the failing mechanism.
        tag: DiscoveryTag,
        /// Failure description.
        reason: String,
    },

    /// A discovery mechanism refused a listener.
    #[error("discovery `{tag}` refused listener: {reason}")]
    Subscribe {
        /// Tag of the refusing mechanism.
        tag: DiscoveryTag,
        /// Failure description.
        reason: String,
    },

    /// Dialing a peer failed.
    #[error("dial to {peer} failed: {reason}")]
    Dial {
        /// The peer that could not be reached.
        peer: PeerId,
        /// Failure description.
        reason: String,
    },

    /// An operation exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed multiaddr.
    #[error("invalid multiaddr `{addr}`: {reason}")]
    InvalidMultiaddr {
        /// The rejected input.
        addr: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Malformed peer id.
    #[error("invalid peer id `{0}`")]
    InvalidPeerId(String),

    /// A lifecycle transition task was cancelled before finishing, e.g.
    /// because the runtime shut down.
    #[error("lifecycle task cancelled: {0}")]
    Lifecycle(String),
}

impl Error {
    /// Create a mechanism start error.
    pub fn mechanism_start<S: ToString>(tag: DiscoveryTag, reason: S) -> Self {
        Self::MechanismStart {
            tag,
            reason: reason.to_string(),
        }
    }

    /// Create a mechanism stop error.
    pub fn mechanism_stop<S: ToString>(tag: DiscoveryTag, reason: S) -> Self {
        Self::MechanismStop {
            tag,
            reason: reason.to_string(),
        }
    }

    /// Create a listener attach error.
    pub fn subscribe<S: ToString>(tag: DiscoveryTag, reason: S) -> Self {
        Self::Subscribe {
            tag,
            reason: reason.to_string(),
        }
    }

    /// Create a dial error.
    pub fn dial<S: ToString>(peer: PeerId, reason: S) -> Self {
        Self::Dial {
            peer,
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a configuration error, the only class that
    /// aborts [`Node::start`](crate::Node::start).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::DuplicateTag(_) | Self::InvalidConfig(_))
    }
}
