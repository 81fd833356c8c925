//! Successor list of a ring node.

use super::id::RingId;
use super::peer::PeerRef;

/// Ordered sequence of up to `max` known successors.
///
/// The head always mirrors finger row 1. Duplicates are permitted when
/// the ring holds fewer distinct nodes than `max`; the periodic
/// fix pass rebuilds the list from live peers.
#[derive(Clone, Debug)]
pub struct SuccessorList {
    max: usize,
    entries: Vec<PeerRef>,
}

impl SuccessorList {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            entries: Vec::with_capacity(max),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn first(&self) -> Option<&PeerRef> {
        self.entries.first()
    }

    pub fn list(&self) -> &[PeerRef] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Replace the whole list, keeping at most `max` entries.
    pub fn replace(&mut self, mut entries: Vec<PeerRef>) {
        entries.truncate(self.max);
        self.entries = entries;
    }

    /// Drop every entry whose id equals `id`.
    pub fn remove(&mut self, id: &RingId) {
        self.entries.retain(|peer| &peer.id != id);
    }
}
