//! Command line of the ringlet daemon.

use std::path::PathBuf;

use clap::Parser;

use crate::logging::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(name = "ringlet", about = "A Chord DHT node", version)]
pub struct Cli {
    /// TCP address to serve the wire protocol on. A wildcard host is
    /// replaced by the discovered local IP in the advertised address.
    #[arg(long, short = 'b', default_value = "0.0.0.0:4530")]
    pub bind: String,

    /// Path to a TOML configuration file; flags override its values.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// `host:port` of a ring member to join. Absent means "form own ring".
    #[arg(long, short = 'p')]
    pub peer: Option<String>,

    /// Identifier width in bits.
    #[arg(long)]
    pub ring_bits: Option<usize>,

    /// Number of successors kept for fault tolerance.
    #[arg(long)]
    pub successors: Option<usize>,

    /// Seconds between two maintenance ticks.
    #[arg(long)]
    pub tick_interval: Option<u64>,

    /// Deadline of a single remote exchange, in seconds.
    #[arg(long)]
    pub rpc_deadline: Option<u64>,

    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
