//! The process-wide set of peer handles.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::DashMap;

use super::handle::NodeHandle;
use super::handle::Peer;
use super::local::LocalNode;
use super::remote::RemoteNode;
use crate::config::RingConfig;
use crate::dht::PeerRef;
use crate::dht::RingId;
use crate::error::Error;
use crate::error::Result;
use crate::storage::MemStore;
use crate::storage::RingStore;
use crate::transport::Request;
use crate::transport::Response;
use crate::transport::Transport;

/// Interns peer handles by address, owns the single local node, and
/// drives the periodic maintenance.
///
/// The local node's own address always maps to the local node. Removing
/// a peer also purges every reference to it from the local tables.
pub struct NodePool {
    this: Weak<NodePool>,
    local: Arc<LocalNode>,
    peers: DashMap<SocketAddr, Peer>,
    transport: Arc<dyn Transport>,
    config: RingConfig,
}

/// Configures a [NodePool] (and its [LocalNode]) before building it.
pub struct NodePoolBuilder {
    addr: SocketAddr,
    transport: Arc<dyn Transport>,
    config: RingConfig,
    store: Option<Arc<dyn RingStore>>,
    local_id: Option<RingId>,
}

impl NodePoolBuilder {
    pub fn config(mut self, config: RingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn RingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the hash-derived local identifier. Meant for small
    /// deterministic rings; production nodes derive theirs from the
    /// address.
    pub fn local_id(mut self, id: RingId) -> Self {
        self.local_id = Some(id);
        self
    }

    pub fn build(self) -> Result<Arc<NodePool>> {
        self.config.validate()?;
        let bits = self.config.ring_bit_width;
        let id = self
            .local_id
            .unwrap_or_else(|| RingId::from_addr(&self.addr, bits));
        let me = PeerRef::new(id, self.addr);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemStore::new()) as Arc<dyn RingStore>);

        let pool = Arc::new_cyclic(|weak: &Weak<NodePool>| {
            let local = Arc::new(LocalNode::new(
                me,
                bits,
                self.config.successor_list_length,
                store,
                weak.clone(),
            ));
            let peers = DashMap::new();
            peers.insert(self.addr, Peer::Local(local.clone()));
            NodePool {
                this: weak.clone(),
                local,
                peers,
                transport: self.transport,
                config: self.config,
            }
        });
        Ok(pool)
    }
}

impl NodePool {
    pub fn builder(addr: SocketAddr, transport: Arc<dyn Transport>) -> NodePoolBuilder {
        NodePoolBuilder {
            addr,
            transport,
            config: RingConfig::default(),
            store: None,
            local_id: None,
        }
    }

    pub fn local(&self) -> &Arc<LocalNode> {
        &self.local
    }

    pub fn local_peer(&self) -> Peer {
        Peer::Local(self.local.clone())
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, addr: SocketAddr) -> Option<Peer> {
        self.peers.get(&addr).map(|entry| entry.value().clone())
    }

    /// Return the interned handle for this peer, creating a remote proxy
    /// on first sight. The id recorded in `peer` is trusted, so an
    /// already-known id survives re-interning.
    pub fn get_or_create(&self, peer: &PeerRef) -> Peer {
        if peer.addr == self.local.addr() {
            return self.local_peer();
        }
        self.peers
            .entry(peer.addr)
            .or_insert_with(|| {
                Peer::Remote(RemoteNode::spawn(
                    peer.clone(),
                    self.config.ring_bit_width,
                    self.transport.clone(),
                    self.config.rpc_deadline(),
                    self.this.clone(),
                ))
            })
            .value()
            .clone()
    }

    /// Intern the handle for a bare address, deriving its id by hashing.
    pub fn get_or_create_addr(&self, addr: SocketAddr) -> Peer {
        self.get_or_create(&PeerRef::from_addr(addr, self.config.ring_bit_width))
    }

    /// Install an externally built handle, e.g. another in-process node.
    /// The local node's slot cannot be displaced.
    pub fn register(&self, peer: Peer) {
        let addr = peer.addr();
        if addr == self.local.addr() {
            return;
        }
        self.peers.insert(addr, peer);
    }

    /// Drop the handle for `addr` and purge the local tables of it.
    /// Removing the local node is a no-op.
    pub fn remove(&self, addr: SocketAddr) {
        if addr == self.local.addr() {
            return;
        }
        if let Some((_, peer)) = self.peers.remove(&addr) {
            tracing::info!("removing peer {} from the pool", addr);
            if let Peer::Remote(remote) = &peer {
                remote.revoke();
            }
            if let Err(e) = self.local.disassociate(peer.id()) {
                tracing::error!("failed to disassociate {}: {}", addr, e);
            }
        }
    }

    /// One maintenance round: heartbeat every remote peer, then let the
    /// local node repair its successor list, successor and one finger.
    /// Peer errors are recorded, never fatal.
    pub async fn tick(&self) {
        for entry in self.peers.iter() {
            if let Peer::Remote(remote) = entry.value() {
                let remote = remote.clone();
                let pool = self.this.clone();
                let addr = entry.key().to_owned();
                tokio::spawn(async move {
                    if let Err(e) = remote.heartbeat().await {
                        tracing::warn!("heartbeat to {} failed: {}", addr, e);
                        if let Some(pool) = pool.upgrade() {
                            pool.remove(addr);
                        }
                    }
                });
            }
        }

        if let Err(e) = self.local.fix_successor_list().await {
            tracing::warn!("fix_successor_list failed: {}", e);
        }
        if let Err(e) = self.local.stabilize().await {
            tracing::warn!("stabilize failed: {}", e);
        }
        if let Err(e) = self.local.fix_random_finger().await {
            tracing::warn!("fix_random_finger failed: {}", e);
        }
        if let Err(e) = self.local.prune_keys().await {
            tracing::warn!("key prune failed: {}", e);
        }
    }

    fn checked_index(&self, index: usize) -> Result<usize> {
        let bits = self.config.ring_bit_width;
        if index >= 1 && index <= bits {
            Ok(index)
        } else {
            Err(Error::IndexOutOfRange { index, bits })
        }
    }

    /// Answer one wire verb against the local node. This is the single
    /// server-side entry point shared by every transport encoding.
    pub async fn serve(&self, request: Request) -> Result<Response> {
        let local = &self.local;
        match request {
            Request::Heartbeat => Ok(Response::Ack),
            Request::GetFingerNode(index) => {
                let index = self.checked_index(index)?;
                let node = local.finger_node(index).await?;
                Ok(Response::Addr(node.addr))
            }
            Request::SetFingerNode(index, addr) => {
                let index = self.checked_index(index)?;
                let peer = self.get_or_create_addr(addr);
                local.set_finger_node(index, &peer.peer_ref()).await?;
                Ok(Response::Ack)
            }
            Request::GetSuccessor => {
                let succ = local.successor().await?;
                Ok(Response::Addr(succ.addr))
            }
            Request::GetSuccessorList => {
                let list = local.successor_list().await?;
                Ok(Response::Addrs(list.into_iter().map(|p| p.addr).collect()))
            }
            Request::GetPredecessor => match local.predecessor().await? {
                Some(pred) => Ok(Response::Addr(pred.addr)),
                None => Err(Error::PredecessorUnset),
            },
            Request::SetSuccessorList(addrs) => {
                let list: Vec<PeerRef> = addrs
                    .into_iter()
                    .map(|addr| self.get_or_create_addr(addr).peer_ref())
                    .collect();
                local.set_successor_list(&list).await?;
                Ok(Response::Ack)
            }
            Request::SetPredecessor(addr) => {
                let peer = self.get_or_create_addr(addr);
                local.set_predecessor(&peer.peer_ref()).await?;
                Ok(Response::Ack)
            }
            Request::FindSuccessor(id) => {
                let node = local.find_successor(&id).await?;
                Ok(Response::Addr(node.addr))
            }
            Request::FindPredecessor(id) => {
                let node = local.find_predecessor(&id).await?;
                Ok(Response::Addr(node.addr))
            }
            Request::Disassociate(id) => {
                let gone: Vec<SocketAddr> = self
                    .peers
                    .iter()
                    .filter(|entry| !entry.value().is_local() && entry.value().id() == &id)
                    .map(|entry| *entry.key())
                    .collect();
                for addr in gone {
                    self.remove(addr);
                }
                local.disassociate(&id)?;
                Ok(Response::Ack)
            }
            Request::KeysInRange(from, to) => {
                let keys = local.store().keys_in_range(&from, &to).await?;
                Ok(Response::Keys(keys))
            }
            Request::GetValue(key) => match local.store().get(&key).await? {
                Some(value) => Ok(Response::Value(value)),
                None => Err(Error::KeyNotFound(key.to_string())),
            },
        }
    }
}
