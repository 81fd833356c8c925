//! Identifiers on the modular ring.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::net::SocketAddr;
use std::ops::Add;
use std::ops::Neg;
use std::ops::Sub;
use std::str::FromStr;

use num_bigint::BigUint;
use sha1::Digest;
use sha1::Sha1;

use crate::consts::DEFAULT_RING_BITS;
use crate::error::Error;
use crate::error::Result;

/// Width in bits of a SHA-1 digest, the widest ring supported by hashing.
const SHA1_BITS: usize = 160;

/// RingId is a point of the finite ring R(P) where P = 2^bits.
/// Both node identifiers and keys inhabit the same ring.
///
/// The value is kept reduced mod 2^bits at all times. Comparison and
/// equality act on the plain unsigned value; ring-wrap semantics live
/// exclusively in [super::interval].
#[derive(Clone, Debug)]
pub struct RingId {
    value: BigUint,
    bits: usize,
}

impl RingId {
    /// Build an id from a big integer, reduced mod 2^bits.
    pub fn new(value: BigUint, bits: usize) -> Self {
        Self {
            value: value % ceil(bits),
            bits,
        }
    }

    /// Hash arbitrary bytes onto the ring: SHA-1, truncated to the high
    /// `bits` bits when the ring is narrower than the digest.
    pub fn from_bytes(bytes: &[u8], bits: usize) -> Self {
        let digest = Sha1::digest(bytes);
        let mut value = BigUint::from_bytes_be(&digest);
        if bits < SHA1_BITS {
            value >>= SHA1_BITS - bits;
        }
        Self::new(value, bits)
    }

    /// The id of the node reachable at `addr`, derived from the canonical
    /// `host:port` form of the address.
    pub fn from_addr(addr: &SocketAddr, bits: usize) -> Self {
        Self::from_bytes(addr.to_string().as_bytes(), bits)
    }

    /// Parse a hexadecimal string onto a ring of the given width.
    pub fn from_hex(s: &str, bits: usize) -> Result<Self> {
        let value = BigUint::parse_bytes(s.as_bytes(), 16)
            .ok_or_else(|| Error::Malformed(format!("invalid hexadecimal id: {s}")))?;
        Ok(Self::new(value, bits))
    }

    pub fn from_u64(value: u64, bits: usize) -> Self {
        Self::new(BigUint::from(value), bits)
    }

    /// 2^exponent on the ring; yields zero when `exponent == bits`.
    pub fn two_pow(exponent: u32, bits: usize) -> Self {
        Self::new(BigUint::from(2u8).pow(exponent), bits)
    }

    pub fn zero(bits: usize) -> Self {
        Self::new(BigUint::default(), bits)
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn bits(&self) -> usize {
        self.bits
    }
}

fn ceil(bits: usize) -> BigUint {
    BigUint::from(2u8).pow(bits as u32)
}

/// Equality and ordering compare the plain value, so that an id survives
/// a round trip through its string form regardless of how the width was
/// recovered on parse.
impl PartialEq for RingId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for RingId {}

impl PartialOrd for RingId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RingId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for RingId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Neg for &RingId {
    type Output = RingId;

    fn neg(self) -> RingId {
        RingId::new(ceil(self.bits) - &self.value, self.bits)
    }
}

impl Add for &RingId {
    type Output = RingId;

    fn add(self, rhs: Self) -> RingId {
        debug_assert_eq!(self.bits, rhs.bits, "ids from different rings");
        RingId::new(&self.value + &rhs.value, self.bits)
    }
}

/// a - b is the ring distance from b to a, reduced mod 2^bits.
impl Sub for &RingId {
    type Output = RingId;

    fn sub(self, rhs: Self) -> RingId {
        self + &-rhs
    }
}

/// Lowercase hex, zero-padded to the full ring width.
impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let width = (self.bits + 3) / 4;
        write!(f, "{:0>width$}", self.value.to_str_radix(16))
    }
}

impl FromStr for RingId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s, DEFAULT_RING_BITS)
    }
}
