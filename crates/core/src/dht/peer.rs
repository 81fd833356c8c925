//! Lightweight references to ring members.

use std::fmt;
use std::net::SocketAddr;

use super::id::RingId;

/// Address-keyed reference to a ring member.
///
/// The routing tables hold these small values instead of owning peer
/// handles; the pool maps an address back to a live handle on demand.
/// The id of a peer is always derivable from its address, so a bare
/// address received over the wire reconstructs the same reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerRef {
    pub id: RingId,
    pub addr: SocketAddr,
}

impl PeerRef {
    pub fn new(id: RingId, addr: SocketAddr) -> Self {
        Self { id, addr }
    }

    /// Reference to the peer reachable at `addr`, id derived by hashing.
    pub fn from_addr(addr: SocketAddr, bits: usize) -> Self {
        Self {
            id: RingId::from_addr(&addr, bits),
            addr,
        }
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_addr_matches_hash_of_canonical_form() {
        let addr: SocketAddr = "10.1.2.3:4000".parse().unwrap();
        let peer = PeerRef::from_addr(addr, 160);
        assert_eq!(peer.id, RingId::from_bytes(b"10.1.2.3:4000", 160));
        assert_eq!(peer.addr, addr);
    }

    #[test]
    fn test_display_joins_id_and_addr() {
        let addr: SocketAddr = "127.0.0.1:7001".parse().unwrap();
        let peer = PeerRef::new(RingId::from_u64(5, 3), addr);
        assert_eq!(peer.to_string(), "5@127.0.0.1:7001");
    }
}
