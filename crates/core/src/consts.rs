//! Constant variables.

/// Default identifier width in bits, the output width of SHA-1.
pub const DEFAULT_RING_BITS: usize = 160;

/// Default number of successors kept for fault tolerance.
pub const DEFAULT_SUCCESSOR_LIST_LEN: usize = 3;

/// Default seconds between two maintenance ticks.
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 30;

/// Default deadline for a single remote exchange, in seconds.
pub const DEFAULT_RPC_DEADLINE_SECS: u64 = 20;

/// Depth of the per-peer mailbox; senders beyond this wait for a free slot.
pub const MAILBOX_DEPTH: usize = 32;
