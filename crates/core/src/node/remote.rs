//! Proxy for a ring member reachable over the transport.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use super::handle::NodeHandle;
use super::pool::NodePool;
use crate::consts::MAILBOX_DEPTH;
use crate::dht::finger;
use crate::dht::PeerRef;
use crate::dht::RingId;
use crate::error::Error;
use crate::error::Result;
use crate::transport::Request;
use crate::transport::Response;
use crate::transport::Transport;

/// One queued exchange: a verb and the caller's completion slot.
struct Unit {
    request: Request,
    reply: oneshot::Sender<Result<Response>>,
}

/// Handle to a remote peer.
///
/// All operations funnel through a single mailbox task that owns the
/// transport exchanges for this peer, so requests to one peer never
/// overlap. A transport-level failure poisons the handle: the mailbox
/// closes, queued callers fail, and the pool is told to drop the peer.
pub struct RemoteNode {
    peer: PeerRef,
    bits: usize,
    mailbox: mpsc::Sender<Unit>,
    revoked: AtomicBool,
}

impl RemoteNode {
    pub(crate) fn spawn(
        peer: PeerRef,
        bits: usize,
        transport: Arc<dyn Transport>,
        deadline: Duration,
        pool: Weak<NodePool>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(MAILBOX_DEPTH);
        let node = Arc::new(Self {
            peer: peer.clone(),
            bits,
            mailbox: tx,
            revoked: AtomicBool::new(false),
        });
        // The task holds only a weak reference, so an unused handle is
        // dropped together with its mailbox.
        tokio::spawn(Self::run_mailbox(
            peer,
            Arc::downgrade(&node),
            rx,
            transport,
            deadline,
            pool,
        ));
        node
    }

    async fn run_mailbox(
        peer: PeerRef,
        node: Weak<Self>,
        mut rx: mpsc::Receiver<Unit>,
        transport: Arc<dyn Transport>,
        deadline: Duration,
        pool: Weak<NodePool>,
    ) {
        let addr = peer.addr;
        while let Some(unit) = rx.recv().await {
            let result = match tokio::time::timeout(deadline, transport.exchange(addr, unit.request))
                .await
            {
                Err(_) => Err(Error::Timeout(addr)),
                Ok(result) => result,
            };

            let failed = result.as_ref().err().map(Error::is_transport).unwrap_or(false);
            let _ = unit.reply.send(result);

            if failed {
                tracing::warn!("transport to {} failed, revoking peer", peer);
                if let Some(node) = node.upgrade() {
                    node.revoked.store(true, Ordering::Release);
                }
                rx.close();
                while let Some(pending) = rx.recv().await {
                    let _ = pending.reply.send(Err(Error::Unreachable(addr)));
                }
                if let Some(pool) = pool.upgrade() {
                    pool.remove(addr);
                }
                return;
            }
        }
    }

    async fn call(&self, request: Request) -> Result<Response> {
        if self.revoked.load(Ordering::Acquire) {
            return Err(Error::Unreachable(self.peer.addr));
        }
        let (reply, completion) = oneshot::channel();
        self.mailbox
            .send(Unit { request, reply })
            .await
            .map_err(|_| Error::Unreachable(self.peer.addr))?;
        completion
            .await
            .map_err(|_| Error::Unreachable(self.peer.addr))?
    }

    /// Mark the handle dead; subsequent callers fail without touching
    /// the transport.
    pub(crate) fn revoke(&self) {
        self.revoked.store(true, Ordering::Release);
    }

    fn peer_from(&self, addr: SocketAddr) -> PeerRef {
        PeerRef::from_addr(addr, self.bits)
    }

    /// Probe the peer's liveness.
    pub async fn heartbeat(&self) -> Result<()> {
        self.call(Request::Heartbeat).await?.into_ack()
    }

    /// Tell the peer that the node identified by `id` is gone.
    pub async fn disassociate(&self, id: &RingId) -> Result<()> {
        self.call(Request::Disassociate(id.clone())).await?.into_ack()
    }

    /// Keys the peer stores inside the closed-open interval `[from, to)`.
    pub async fn keys_in_range(&self, from: &RingId, to: &RingId) -> Result<Vec<RingId>> {
        self.call(Request::KeysInRange(from.clone(), to.clone()))
            .await?
            .into_keys()
    }

    /// Fetch the value the peer stores under `key`.
    pub async fn get_value(&self, key: &RingId) -> Result<Vec<u8>> {
        self.call(Request::GetValue(key.clone())).await?.into_value()
    }
}

#[async_trait]
impl NodeHandle for RemoteNode {
    fn id(&self) -> &RingId {
        &self.peer.id
    }

    fn addr(&self) -> SocketAddr {
        self.peer.addr
    }

    fn finger_start(&self, index: usize) -> RingId {
        finger::finger_start(&self.peer.id, index, self.bits)
    }

    async fn finger_node(&self, index: usize) -> Result<PeerRef> {
        let addr = self.call(Request::GetFingerNode(index)).await?.into_addr()?;
        Ok(self.peer_from(addr))
    }

    async fn set_finger_node(&self, index: usize, node: &PeerRef) -> Result<()> {
        self.call(Request::SetFingerNode(index, node.addr))
            .await?
            .into_ack()
    }

    async fn successor(&self) -> Result<PeerRef> {
        let addr = self.call(Request::GetSuccessor).await?.into_addr()?;
        Ok(self.peer_from(addr))
    }

    async fn successor_list(&self) -> Result<Vec<PeerRef>> {
        let addrs = self.call(Request::GetSuccessorList).await?.into_addrs()?;
        Ok(addrs.into_iter().map(|a| self.peer_from(a)).collect())
    }

    async fn predecessor(&self) -> Result<Option<PeerRef>> {
        match self.call(Request::GetPredecessor).await {
            Ok(response) => Ok(Some(self.peer_from(response.into_addr()?))),
            Err(Error::PredecessorUnset) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set_successor_list(&self, list: &[PeerRef]) -> Result<()> {
        let addrs = list.iter().map(|p| p.addr).collect();
        self.call(Request::SetSuccessorList(addrs)).await?.into_ack()
    }

    async fn set_predecessor(&self, node: &PeerRef) -> Result<()> {
        self.call(Request::SetPredecessor(node.addr)).await?.into_ack()
    }

    async fn find_successor(&self, id: &RingId) -> Result<PeerRef> {
        let addr = self
            .call(Request::FindSuccessor(id.clone()))
            .await?
            .into_addr()?;
        Ok(self.peer_from(addr))
    }

    async fn find_predecessor(&self, id: &RingId) -> Result<PeerRef> {
        let addr = self
            .call(Request::FindPredecessor(id.clone()))
            .await?
            .into_addr()?;
        Ok(self.peer_from(addr))
    }
}
