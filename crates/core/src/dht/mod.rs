//! Identifier arithmetic and routing tables of the ring.
//!
//! Based on Chord, ref: <https://pdos.csail.mit.edu/papers/ton:chord/paper-ton.pdf>.
//! With high probability a lookup in an N-node ring contacts O(log N) peers.

pub mod id;
pub use id::RingId;
pub mod interval;
pub mod peer;
pub use peer::PeerRef;
pub mod finger;
pub use finger::FingerTable;
pub mod successor;
pub use successor::SuccessorList;
