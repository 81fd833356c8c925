//! Error of ringlet-core.

use std::net::SocketAddr;

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors collection in ringlet-core.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Peer {0} is unreachable")]
    Unreachable(SocketAddr),

    #[error("Peer {0} did not answer within the deadline")]
    Timeout(SocketAddr),

    #[error("Malformed reply: {0}")]
    Malformed(String),

    #[error("Ring invariant violated: {0}")]
    InvariantViolated(&'static str),

    #[error("Finger index {index} out of range 1..={bits}")]
    IndexOutOfRange { index: usize, bits: usize },

    #[error("Predecessor is not set")]
    PredecessorUnset,

    #[error("No value stored under key {0}")]
    KeyNotFound(String),

    #[error("Local ring state lock poisoned")]
    StateLock,

    #[error("Node pool has shut down")]
    PoolShutdown,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the error indicates that the peer's transport is gone.
    /// Such errors make the pool revoke the peer handle.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Unreachable(_) | Error::Timeout(_))
    }
}
