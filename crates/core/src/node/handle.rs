//! Uniform operation set over local and remote ring members.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use super::local::LocalNode;
use super::remote::RemoteNode;
use crate::dht::RingId;
use crate::dht::PeerRef;
use crate::error::Result;

/// Operations every ring member answers, local or remote.
///
/// `id`, `addr` and `finger_start` are derivable without touching the
/// network and never fail; everything else may cross the wire and fails
/// with `Unreachable`, `Timeout` or `Malformed` accordingly.
///
/// Finger indices run 1..=bits. Passing an index outside that range is a
/// programmer error and asserts; indices arriving over the wire are
/// validated before they reach these methods.
#[async_trait]
pub trait NodeHandle: Send + Sync {
    fn id(&self) -> &RingId;

    fn addr(&self) -> SocketAddr;

    /// Start id of finger row `index`, `(id + 2^(index-1)) mod 2^bits`.
    fn finger_start(&self, index: usize) -> RingId;

    /// Current routing target of finger row `index`.
    async fn finger_node(&self, index: usize) -> Result<PeerRef>;

    async fn set_finger_node(&self, index: usize, node: &PeerRef) -> Result<()>;

    /// First successor on the ring.
    async fn successor(&self) -> Result<PeerRef>;

    async fn successor_list(&self) -> Result<Vec<PeerRef>>;

    /// Predecessor link, absent after startup or an observed failure.
    async fn predecessor(&self) -> Result<Option<PeerRef>>;

    /// Replace the successor list. The list must be non-empty; its head
    /// also becomes finger row 1.
    async fn set_successor_list(&self, list: &[PeerRef]) -> Result<()>;

    async fn set_predecessor(&self, node: &PeerRef) -> Result<()>;

    /// The peer responsible for `id`.
    async fn find_successor(&self, id: &RingId) -> Result<PeerRef>;

    /// The peer whose successor interval contains `id`.
    async fn find_predecessor(&self, id: &RingId) -> Result<PeerRef>;
}

/// A ring member as held by the pool: the one local engine, or a proxy
/// forwarding over the transport. Local-to-local calls dispatch directly
/// and never touch the wire.
#[derive(Clone)]
pub enum Peer {
    Local(Arc<LocalNode>),
    Remote(Arc<RemoteNode>),
}

impl Peer {
    pub fn peer_ref(&self) -> PeerRef {
        PeerRef::new(self.id().clone(), self.addr())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Peer::Local(_))
    }

    fn inner(&self) -> &dyn NodeHandle {
        match self {
            Peer::Local(node) => node.as_ref(),
            Peer::Remote(node) => node.as_ref(),
        }
    }
}

#[async_trait]
impl NodeHandle for Peer {
    fn id(&self) -> &RingId {
        self.inner().id()
    }

    fn addr(&self) -> SocketAddr {
        self.inner().addr()
    }

    fn finger_start(&self, index: usize) -> RingId {
        self.inner().finger_start(index)
    }

    async fn finger_node(&self, index: usize) -> Result<PeerRef> {
        self.inner().finger_node(index).await
    }

    async fn set_finger_node(&self, index: usize, node: &PeerRef) -> Result<()> {
        self.inner().set_finger_node(index, node).await
    }

    async fn successor(&self) -> Result<PeerRef> {
        self.inner().successor().await
    }

    async fn successor_list(&self) -> Result<Vec<PeerRef>> {
        self.inner().successor_list().await
    }

    async fn predecessor(&self) -> Result<Option<PeerRef>> {
        self.inner().predecessor().await
    }

    async fn set_successor_list(&self, list: &[PeerRef]) -> Result<()> {
        self.inner().set_successor_list(list).await
    }

    async fn set_predecessor(&self, node: &PeerRef) -> Result<()> {
        self.inner().set_predecessor(node).await
    }

    async fn find_successor(&self, id: &RingId) -> Result<PeerRef> {
        self.inner().find_successor(id).await
    }

    async fn find_predecessor(&self, id: &RingId) -> Result<PeerRef> {
        self.inner().find_predecessor(id).await
    }
}
