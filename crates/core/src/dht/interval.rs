//! Half-open interval membership on the modular ring.
//!
//! These three predicates are the only place where ring-wrap semantics
//! live; everything else reduces its ordering questions to them.

use super::id::RingId;

/// Test `probe` against the open interval `(start, stop)`.
///
/// When `start == stop` the interval covers every point except the shared
/// endpoint, which is what lets a second node slip between a node and
/// itself while the ring is still forming.
pub fn in_open_open(start: &RingId, stop: &RingId, probe: &RingId) -> bool {
    if start < stop {
        start < probe && probe < stop
    } else {
        probe > start || probe < stop
    }
}

/// Test `probe` against the half-open interval `(start, stop]`.
pub fn in_open_closed(start: &RingId, stop: &RingId, probe: &RingId) -> bool {
    if start < stop {
        start < probe && probe <= stop
    } else {
        probe > start || probe <= stop
    }
}

/// Test `probe` against the half-open interval `[start, stop)`.
pub fn in_closed_open(start: &RingId, stop: &RingId, probe: &RingId) -> bool {
    if start < stop {
        start <= probe && probe < stop
    } else {
        probe >= start || probe < stop
    }
}
