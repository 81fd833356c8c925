//! Finger table of the Chord ring.

use super::id::RingId;
use super::peer::PeerRef;

/// Per-node routing table of `bits` rows, indexed 1..=bits.
///
/// Row i covers the ring span starting at `(owner + 2^(i-1)) mod 2^bits`
/// and records the best known successor of that start. Starts are fixed
/// at construction; only the node column ever changes.
#[derive(Clone, Debug)]
pub struct FingerTable {
    owner: PeerRef,
    bits: usize,
    starts: Vec<RingId>,
    nodes: Vec<Option<PeerRef>>,
}

/// `(owner + 2^(i-1)) mod 2^bits`, the canonical start of row i.
pub fn finger_start(owner: &RingId, index: usize, bits: usize) -> RingId {
    assert!(
        index >= 1 && index <= bits,
        "finger index {index} out of range 1..={bits}"
    );
    owner + &RingId::two_pow(index as u32 - 1, bits)
}

impl FingerTable {
    pub fn new(owner: PeerRef, bits: usize) -> Self {
        let starts = (1..=bits)
            .map(|i| finger_start(&owner.id, i, bits))
            .collect();
        Self {
            owner,
            bits,
            starts,
            nodes: vec![None; bits],
        }
    }

    pub fn bits(&self) -> usize {
        self.bits
    }

    fn slot(&self, index: usize) -> usize {
        assert!(
            index >= 1 && index <= self.bits,
            "finger index {index} out of range 1..={}",
            self.bits
        );
        index - 1
    }

    /// Start id of row `index`.
    pub fn start(&self, index: usize) -> &RingId {
        &self.starts[self.slot(index)]
    }

    /// The raw node column of row `index`, without fallback.
    pub fn node(&self, index: usize) -> Option<&PeerRef> {
        self.nodes[self.slot(index)].as_ref()
    }

    /// Resolve row `index`, scanning forward (with wrap-around) past empty
    /// rows and falling back to the owner itself when the whole table is
    /// empty. The fallback is the single-node-ring degenerate case.
    pub fn lookup(&self, index: usize) -> PeerRef {
        let slot = self.slot(index);
        for offset in 0..self.bits {
            if let Some(node) = &self.nodes[(slot + offset) % self.bits] {
                return node.clone();
            }
        }
        self.owner.clone()
    }

    pub fn set(&mut self, index: usize, node: PeerRef) {
        let slot = self.slot(index);
        tracing::debug!("set finger row {} of {} to {}", index, self.owner, node);
        self.nodes[slot] = Some(node);
    }

    pub fn clear(&mut self, index: usize) {
        let slot = self.slot(index);
        self.nodes[slot] = None;
    }

    /// Clear every row pointing at `id`.
    pub fn remove(&mut self, id: &RingId) {
        for node in self.nodes.iter_mut() {
            if node.as_ref().map(|n| &n.id == id).unwrap_or(false) {
                *node = None;
            }
        }
    }

    /// First set row, if any.
    pub fn first(&self) -> Option<&PeerRef> {
        self.nodes.iter().flatten().next()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(|n| n.is_none())
    }

    pub fn rows(&self) -> &[Option<PeerRef>] {
        &self.nodes
    }
}
