//! Wire contract between peers.
//!
//! The engine depends on a request/response channel carrying a small
//! closed set of verbs. Any encoding suffices as long as addresses and
//! ids round-trip losslessly; the text helpers in [codec] define the
//! reply bodies shared by every encoding.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::dht::RingId;
use crate::error::Error;
use crate::error::Result;

pub mod codec;

/// The verbs a peer must answer. The first eleven are the routing
/// surface; the last two expose the key/value store for range transfers
/// around joins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Heartbeat,
    GetFingerNode(usize),
    SetFingerNode(usize, SocketAddr),
    GetSuccessor,
    GetSuccessorList,
    GetPredecessor,
    SetSuccessorList(Vec<SocketAddr>),
    SetPredecessor(SocketAddr),
    FindSuccessor(RingId),
    FindPredecessor(RingId),
    Disassociate(RingId),
    KeysInRange(RingId, RingId),
    GetValue(RingId),
}

/// Reply shapes. Failures travel as [Error] values, mapped onto
/// [WireStatus] at the encoding boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Ack,
    Addr(SocketAddr),
    Addrs(Vec<SocketAddr>),
    Keys(Vec<RingId>),
    Value(Vec<u8>),
}

/// Three-valued reply status of the wire contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireStatus {
    Ok,
    /// The requested thing does not exist or cannot be reached right now.
    NotFound,
    /// The request itself was unacceptable.
    BadRequest,
}

impl From<&Error> for WireStatus {
    fn from(error: &Error) -> Self {
        match error {
            Error::Malformed(_)
            | Error::InvariantViolated(_)
            | Error::IndexOutOfRange { .. }
            | Error::InvalidConfig(_) => WireStatus::BadRequest,
            _ => WireStatus::NotFound,
        }
    }
}

/// A request/response channel to remote peers.
///
/// One exchange carries one verb and returns one reply. Implementations
/// report connection-level failure as [Error::Unreachable]; the deadline
/// is enforced by the calling proxy, not here.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn exchange(&self, target: SocketAddr, request: Request) -> Result<Response>;
}

impl Response {
    /// Unpack a single-address reply.
    pub fn into_addr(self) -> Result<SocketAddr> {
        match self {
            Response::Addr(addr) => Ok(addr),
            other => Err(Error::Malformed(format!("expected address, got {other:?}"))),
        }
    }

    /// Unpack an address-list reply.
    pub fn into_addrs(self) -> Result<Vec<SocketAddr>> {
        match self {
            Response::Addrs(addrs) => Ok(addrs),
            other => Err(Error::Malformed(format!(
                "expected address list, got {other:?}"
            ))),
        }
    }

    /// Unpack an acknowledgement.
    pub fn into_ack(self) -> Result<()> {
        match self {
            Response::Ack => Ok(()),
            other => Err(Error::Malformed(format!(
                "expected acknowledgement, got {other:?}"
            ))),
        }
    }

    /// Unpack a key-list reply.
    pub fn into_keys(self) -> Result<Vec<RingId>> {
        match self {
            Response::Keys(keys) => Ok(keys),
            other => Err(Error::Malformed(format!("expected key list, got {other:?}"))),
        }
    }

    /// Unpack a value reply.
    pub fn into_value(self) -> Result<Vec<u8>> {
        match self {
            Response::Value(value) => Ok(value),
            other => Err(Error::Malformed(format!("expected value, got {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        assert_eq!(WireStatus::from(&Error::Unreachable(addr)), WireStatus::NotFound);
        assert_eq!(WireStatus::from(&Error::PredecessorUnset), WireStatus::NotFound);
        assert_eq!(
            WireStatus::from(&Error::Malformed("x".into())),
            WireStatus::BadRequest
        );
        assert_eq!(
            WireStatus::from(&Error::IndexOutOfRange { index: 0, bits: 3 }),
            WireStatus::BadRequest
        );
    }

    #[test]
    fn test_response_unpacking_rejects_wrong_shape() {
        assert!(Response::Ack.into_addr().is_err());
        assert!(Response::Addrs(vec![]).into_ack().is_err());
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        assert_eq!(Response::Addr(addr).into_addr().unwrap(), addr);
    }
}
