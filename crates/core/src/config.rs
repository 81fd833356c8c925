//! Ring configuration.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::consts;
use crate::error::Error;
use crate::error::Result;

/// Tunables of the ring engine. Field names double as the keys recognised
/// in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Identifier width in bits.
    pub ring_bit_width: usize,
    /// Number of successors kept for fault tolerance. Minimum 1.
    pub successor_list_length: usize,
    /// Seconds between two maintenance ticks.
    pub maintenance_interval_seconds: u64,
    /// Deadline of a single remote exchange, in seconds.
    pub rpc_deadline_seconds: u64,
    /// Address of a ring member to join through. Absent means "form own ring".
    pub bootstrap_peer_address: Option<String>,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_bit_width: consts::DEFAULT_RING_BITS,
            successor_list_length: consts::DEFAULT_SUCCESSOR_LIST_LEN,
            maintenance_interval_seconds: consts::DEFAULT_MAINTENANCE_INTERVAL_SECS,
            rpc_deadline_seconds: consts::DEFAULT_RPC_DEADLINE_SECS,
            bootstrap_peer_address: None,
        }
    }
}

impl RingConfig {
    /// Check the configured values against their documented bounds.
    pub fn validate(&self) -> Result<()> {
        if self.ring_bit_width == 0 {
            return Err(Error::InvalidConfig(
                "ring_bit_width must be at least 1".into(),
            ));
        }
        if self.successor_list_length == 0 {
            return Err(Error::InvalidConfig(
                "successor_list_length must be at least 1".into(),
            ));
        }
        if self.rpc_deadline_seconds == 0 {
            return Err(Error::InvalidConfig(
                "rpc_deadline_seconds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_seconds)
    }

    pub fn rpc_deadline(&self) -> Duration {
        Duration::from_secs(self.rpc_deadline_seconds)
    }
}
