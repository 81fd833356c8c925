//! The local node engine.
//!
//! One mutex guards the ring state. The protocol operations snapshot
//! under the lock, release it for every remote exchange, then re-acquire
//! and re-validate before publishing, so a reciprocal call from the peer
//! being contacted can never deadlock against us.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::Weak;

use async_recursion::async_recursion;
use async_trait::async_trait;
use rand::Rng;

use super::handle::NodeHandle;
use super::handle::Peer;
use super::pool::NodePool;
use crate::dht::finger;
use crate::dht::interval::in_closed_open;
use crate::dht::interval::in_open_closed;
use crate::dht::interval::in_open_open;
use crate::dht::FingerTable;
use crate::dht::PeerRef;
use crate::dht::RingId;
use crate::dht::SuccessorList;
use crate::error::Error;
use crate::error::Result;
use crate::storage::RingStore;

pub(crate) struct RingState {
    pub(crate) finger: FingerTable,
    pub(crate) successors: SuccessorList,
    pub(crate) predecessor: Option<PeerRef>,
}

/// A member of the ring living in this process.
pub struct LocalNode {
    me: PeerRef,
    bits: usize,
    state: Mutex<RingState>,
    pool: Weak<NodePool>,
    store: Arc<dyn RingStore>,
}

impl LocalNode {
    pub(crate) fn new(
        me: PeerRef,
        bits: usize,
        succ_max: usize,
        store: Arc<dyn RingStore>,
        pool: Weak<NodePool>,
    ) -> Self {
        let state = RingState {
            finger: FingerTable::new(me.clone(), bits),
            successors: SuccessorList::new(succ_max),
            predecessor: None,
        };
        Self {
            me,
            bits,
            state: Mutex::new(state),
            pool,
            store,
        }
    }

    pub fn peer_ref(&self) -> &PeerRef {
        &self.me
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    pub fn store(&self) -> &Arc<dyn RingStore> {
        &self.store
    }

    pub(crate) fn state(&self) -> Result<MutexGuard<RingState>> {
        self.state.lock().map_err(|_| Error::StateLock)
    }

    fn pool(&self) -> Result<Arc<NodePool>> {
        self.pool.upgrade().ok_or(Error::PoolShutdown)
    }

    fn resolve(&self, peer: &PeerRef) -> Result<Peer> {
        Ok(self.pool()?.get_or_create(peer))
    }

    fn local_peer(&self) -> Result<Peer> {
        Ok(self.pool()?.local_peer())
    }
}

/// Join protocol.
impl LocalNode {
    /// Join the ring of `bootstrap`, or form a one-node ring when absent.
    ///
    /// Locating our successor and fetching its neighbours is fatal;
    /// everything after that is carried out on a best-effort basis and
    /// left to the periodic maintenance to finish.
    pub async fn join(&self, bootstrap: Option<&PeerRef>) -> Result<()> {
        let Some(bootstrap) = bootstrap else {
            tracing::info!("{} forming a new ring", self.me);
            let mut state = self.state()?;
            state.predecessor = Some(self.me.clone());
            state.successors.replace(vec![self.me.clone()]);
            for i in 1..=self.bits {
                state.finger.set(i, self.me.clone());
            }
            return Ok(());
        };

        tracing::info!("{} joining the ring through {}", self.me, bootstrap);
        let gateway = self.resolve(bootstrap)?;

        let succ_ref = gateway.find_successor(&self.finger_start(1)).await?;
        let succ = self.resolve(&succ_ref)?;
        let tail = succ.successor_list().await?;
        let pred_ref = succ
            .predecessor()
            .await?
            .ok_or(Error::InvariantViolated("successor has no predecessor"))?;

        // Adopt our own view of the neighbourhood first.
        let mut ours = vec![succ_ref.clone()];
        ours.extend(tail);
        NodeHandle::set_successor_list(self, &ours).await?;
        NodeHandle::set_predecessor(self, &pred_ref).await?;

        // Pull the keys we now own while nobody routes to us yet.
        if let Err(e) = self.migrate_keys_from(&succ).await {
            tracing::warn!("key migration from {} failed: {}", succ_ref, e);
        }

        // Splice ourselves between predecessor and successor.
        let mut spliced = vec![self.me.clone()];
        spliced.extend(ours);
        match self.resolve(&pred_ref) {
            Ok(pred) => {
                if let Err(e) = pred.set_successor_list(&spliced).await {
                    tracing::warn!("could not update successor list of {}: {}", pred_ref, e);
                }
            }
            Err(e) => tracing::warn!("could not reach predecessor {}: {}", pred_ref, e),
        }
        if let Err(e) = succ.set_predecessor(&self.me).await {
            tracing::warn!("could not update predecessor of {}: {}", succ_ref, e);
        }

        self.init_fingers_via(&gateway).await;
        self.update_others().await;
        Ok(())
    }

    /// Seed the remaining finger rows through the gateway node.
    async fn init_fingers_via(&self, gateway: &Peer) {
        for i in 1..self.bits {
            let (current, next_start) = match self.state() {
                Ok(state) => (state.finger.lookup(i), state.finger.start(i + 1).clone()),
                Err(e) => {
                    tracing::warn!("finger init aborted: {}", e);
                    return;
                }
            };

            if in_closed_open(&self.me.id, &current.id, &next_start) {
                // The previous row already covers this start.
                if let Ok(mut state) = self.state() {
                    state.finger.set(i + 1, current);
                }
                continue;
            }

            match gateway.find_successor(&next_start).await {
                Ok(node) => {
                    if let Ok(mut state) = self.state() {
                        state.finger.set(i + 1, node);
                    }
                }
                Err(e) => {
                    // Leave the row empty; fix_fingers will catch up.
                    tracing::warn!("could not seed finger row {}: {}", i + 1, e);
                }
            }
        }
    }

    /// Walk the nodes whose finger tables should now point at us.
    async fn update_others(&self) {
        for i in 2..=self.bits {
            let target = &self.me.id - &RingId::two_pow(i as u32 - 1, self.bits);
            let pred = match self.lookup_predecessor(&target).await {
                Ok(pred) => pred,
                Err(e) => {
                    tracing::warn!("no predecessor found for row {} target: {}", i, e);
                    continue;
                }
            };
            match self.resolve(&pred) {
                Ok(node) => {
                    if let Err(e) = self.update_finger_table(node, &self.me, i).await {
                        tracing::warn!("finger update of {} row {} failed: {}", pred, i, e);
                    }
                }
                Err(e) => tracing::warn!("could not reach {}: {}", pred, e),
            }
        }
    }

    /// If `node`'s row `index` should route through `candidate`, install
    /// it and walk on to `node`'s predecessor.
    #[async_recursion]
    async fn update_finger_table(
        &self,
        node: Peer,
        candidate: &PeerRef,
        index: usize,
    ) -> Result<()> {
        let row = node.finger_node(index).await?;
        let start = node.finger_start(index);
        if !in_closed_open(&start, &row.id, &candidate.id) {
            return Ok(());
        }
        node.set_finger_node(index, candidate).await?;

        if let Some(pred) = node.predecessor().await? {
            // The walk stops at the candidate itself and at self-loops.
            if pred.id != candidate.id && &pred.id != node.id() {
                let pred = self.resolve(&pred)?;
                self.update_finger_table(pred, candidate, index).await?;
            }
        }
        Ok(())
    }
}

/// Lookup protocol.
impl LocalNode {
    pub(crate) async fn lookup_successor(&self, id: &RingId) -> Result<PeerRef> {
        let pred = self.lookup_predecessor(id).await?;
        self.resolve(&pred)?.successor().await
    }

    pub(crate) async fn lookup_predecessor(&self, id: &RingId) -> Result<PeerRef> {
        let mut current = self.local_peer()?;
        // Each hop strictly shrinks the ring distance to `id`; more than
        // bits+1 hops means the topology is lying to us.
        for _ in 0..=self.bits {
            let succ = current.successor().await?;
            if in_open_closed(current.id(), &succ.id, id) {
                return Ok(current.peer_ref());
            }
            current = self.closest_preceding_finger(&current, id).await?;
        }
        tracing::warn!("lookup for {} failed to converge", id);
        Err(Error::Unreachable(current.addr()))
    }

    async fn closest_preceding_finger(&self, node: &Peer, id: &RingId) -> Result<Peer> {
        for i in (1..=self.bits).rev() {
            let row = node.finger_node(i).await?;
            if in_open_open(node.id(), id, &row.id) {
                return self.resolve(&row);
            }
        }
        Ok(node.clone())
    }
}

/// Stabilization and finger maintenance.
impl LocalNode {
    /// Reconcile our successor with that successor's predecessor, then
    /// announce ourselves to whoever ends up in front of us.
    pub async fn stabilize(&self) -> Result<()> {
        let succ_ref = self.state()?.finger.lookup(1);
        let succ = self.resolve(&succ_ref)?;

        if let Some(candidate) = succ.predecessor().await? {
            if candidate.id != self.me.id
                && in_open_open(&self.me.id, &succ_ref.id, &candidate.id)
            {
                let mut state = self.state()?;
                // The successor may have moved while we were on the wire;
                // only adopt the candidate if it still sits in front of us.
                let live = state.finger.lookup(1);
                if in_open_open(&self.me.id, &live.id, &candidate.id) || live == succ_ref {
                    tracing::debug!("{} adopts closer successor {}", self.me, candidate);
                    state.finger.set(1, candidate.clone());
                    let mut list = vec![candidate];
                    list.extend(state.successors.list().to_vec());
                    state.successors.replace(list);
                }
            }
        }

        let succ_ref = self.state()?.finger.lookup(1);
        let succ = self.resolve(&succ_ref)?;
        self.notify_peer(&succ).await
    }

    /// Offer ourselves as predecessor to `succ`. The guard runs on the
    /// receiving side for a local target and on this side, via plain
    /// reads and a conditional write, for a remote one.
    async fn notify_peer(&self, succ: &Peer) -> Result<()> {
        match succ {
            Peer::Local(node) => {
                node.notify(&self.me)?;
                Ok(())
            }
            Peer::Remote(_) => {
                let pred = succ.predecessor().await?;
                let accept = match &pred {
                    None => true,
                    Some(pred) => in_open_open(&pred.id, succ.id(), &self.me.id),
                };
                if accept {
                    succ.set_predecessor(&self.me).await?;
                }
                Ok(())
            }
        }
    }

    /// Accept `candidate` as predecessor if it improves on the current
    /// link. Returns the adopted reference, or None when nothing changed;
    /// repeated announcements are no-ops.
    pub fn notify(&self, candidate: &PeerRef) -> Result<Option<PeerRef>> {
        let mut state = self.state()?;
        let accept = match &state.predecessor {
            None => true,
            Some(pred) => in_open_open(&pred.id, &self.me.id, &candidate.id),
        };
        if accept {
            tracing::debug!("{} adopts predecessor {}", self.me, candidate);
            state.predecessor = Some(candidate.clone());
            Ok(Some(candidate.clone()))
        } else {
            Ok(None)
        }
    }

    /// Refresh finger row `index` by looking up the owner of its start.
    pub async fn fix_finger(&self, index: usize) -> Result<()> {
        let start = NodeHandle::finger_start(self, index);
        let node = self.lookup_successor(&start).await?;
        self.state()?.finger.set(index, node);
        Ok(())
    }

    pub async fn fix_random_finger(&self) -> Result<()> {
        let index = rand::thread_rng().gen_range(1..=self.bits);
        self.fix_finger(index).await
    }

    pub async fn fix_all_fingers(&self) -> Result<()> {
        for index in 1..=self.bits {
            self.fix_finger(index).await?;
        }
        Ok(())
    }

    /// Rebuild the successor list by walking the ring from the current
    /// successor. Duplicates are expected on rings smaller than the list.
    pub async fn fix_successor_list(&self) -> Result<()> {
        let head = self.state()?.finger.lookup(1);
        let max = self.state()?.successors.max();
        let mut chain = vec![head.clone()];
        let mut cursor = head.clone();
        for _ in 1..max {
            cursor = self.resolve(&cursor)?.successor().await?;
            chain.push(cursor.clone());
        }

        let mut state = self.state()?;
        // Skip the publish if the head moved while we walked.
        if state.finger.lookup(1) == head {
            state.successors.replace(chain);
        }
        Ok(())
    }

    /// Purge every reference to `id` from the routing tables. The first
    /// successor slot is refilled from the list when possible; left empty
    /// it triggers rediscovery on the next tick.
    pub fn disassociate(&self, id: &RingId) -> Result<()> {
        let mut state = self.state()?;
        state.finger.remove(id);
        state.successors.remove(id);
        if state.predecessor.as_ref().map(|p| &p.id == id).unwrap_or(false) {
            state.predecessor = None;
        }
        if state.finger.node(1).is_none() {
            if let Some(next) = state.successors.first().cloned() {
                state.finger.set(1, next);
            }
        }
        Ok(())
    }
}

/// Key-range transfers against the external store.
impl LocalNode {
    /// Pull the keys in `(predecessor, self]` from our successor. Called
    /// once after joining, before the ring routes anything to us.
    pub(crate) async fn migrate_keys_from(&self, succ: &Peer) -> Result<usize> {
        let Peer::Remote(remote) = succ else {
            return Ok(0);
        };
        let pred = self
            .state()?
            .predecessor
            .clone()
            .ok_or(Error::PredecessorUnset)?;
        if pred.id == self.me.id {
            return Ok(0);
        }

        // (pred, self] written as the closed-open [pred+1, self+1).
        let one = RingId::from_u64(1, self.bits);
        let low = &pred.id + &one;
        let high = &self.me.id + &one;
        let keys = remote.keys_in_range(&low, &high).await?;

        let mut moved = 0;
        for key in keys {
            match remote.get_value(&key).await {
                Ok(value) => {
                    self.store.set(&key, value).await?;
                    moved += 1;
                }
                // The key vanished between listing and fetch.
                Err(Error::KeyNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if moved > 0 {
            tracing::info!("{} pulled {} keys from {}", self.me, moved, succ.addr());
        }
        Ok(moved)
    }

    /// Drop keys that left our `(predecessor, self]` span, typically
    /// after a new predecessor pulled them during its join.
    pub(crate) async fn prune_keys(&self) -> Result<usize> {
        let Some(pred) = self.state()?.predecessor.clone() else {
            return Ok(0);
        };
        if pred.id == self.me.id {
            return Ok(0);
        }

        // A degenerate closed-open interval covers the whole ring.
        let everything = self.store.keys_in_range(&self.me.id, &self.me.id).await?;
        let mut dropped = 0;
        for key in everything {
            if !in_open_closed(&pred.id, &self.me.id, &key) {
                self.store.remove(&key).await?;
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!("{} pruned {} keys now owned elsewhere", self.me, dropped);
        }
        Ok(dropped)
    }
}

#[async_trait]
impl NodeHandle for LocalNode {
    fn id(&self) -> &RingId {
        &self.me.id
    }

    fn addr(&self) -> SocketAddr {
        self.me.addr
    }

    fn finger_start(&self, index: usize) -> RingId {
        finger::finger_start(&self.me.id, index, self.bits)
    }

    async fn finger_node(&self, index: usize) -> Result<PeerRef> {
        Ok(self.state()?.finger.lookup(index))
    }

    async fn set_finger_node(&self, index: usize, node: &PeerRef) -> Result<()> {
        self.state()?.finger.set(index, node.clone());
        Ok(())
    }

    async fn successor(&self) -> Result<PeerRef> {
        Ok(self.state()?.finger.lookup(1))
    }

    async fn successor_list(&self) -> Result<Vec<PeerRef>> {
        Ok(self.state()?.successors.list().to_vec())
    }

    async fn predecessor(&self) -> Result<Option<PeerRef>> {
        Ok(self.state()?.predecessor.clone())
    }

    async fn set_successor_list(&self, list: &[PeerRef]) -> Result<()> {
        if list.is_empty() {
            return Err(Error::InvariantViolated("successor list must not be empty"));
        }
        let mut state = self.state()?;
        state.finger.set(1, list[0].clone());
        state.successors.replace(list.to_vec());
        Ok(())
    }

    async fn set_predecessor(&self, node: &PeerRef) -> Result<()> {
        self.state()?.predecessor = Some(node.clone());
        Ok(())
    }

    async fn find_successor(&self, id: &RingId) -> Result<PeerRef> {
        self.lookup_successor(id).await
    }

    async fn find_predecessor(&self, id: &RingId) -> Result<PeerRef> {
        self.lookup_predecessor(id).await
    }
}
