//! Daemon settings: defaults, then file, then flags.

use std::net::IpAddr;
use std::net::SocketAddr;

use ringlet_core::RingConfig;
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::Result;
use crate::util;

/// Shape of the TOML configuration file.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bind_address: Option<String>,
    pub ring: RingConfig,
}

/// Fully resolved daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the server binds to.
    pub bind: SocketAddr,
    /// Address peers reach us at; differs from `bind` when binding a
    /// wildcard host.
    pub advertised: SocketAddr,
    pub ring: RingConfig,
}

pub fn load(cli: &Cli) -> Result<Settings> {
    let file = match &cli.config {
        Some(path) => toml::from_str::<FileConfig>(&std::fs::read_to_string(path)?)?,
        None => FileConfig::default(),
    };

    let mut ring = file.ring;
    if let Some(bits) = cli.ring_bits {
        ring.ring_bit_width = bits;
    }
    if let Some(successors) = cli.successors {
        ring.successor_list_length = successors;
    }
    if let Some(seconds) = cli.tick_interval {
        ring.maintenance_interval_seconds = seconds;
    }
    if let Some(seconds) = cli.rpc_deadline {
        ring.rpc_deadline_seconds = seconds;
    }
    if cli.peer.is_some() {
        ring.bootstrap_peer_address = cli.peer.clone();
    }
    ring.validate()?;

    let bind_text = file
        .bind_address
        .filter(|_| cli.bind == default_bind())
        .unwrap_or_else(|| cli.bind.clone());
    let bind: SocketAddr = bind_text.parse()?;
    let advertised = advertised_addr(bind)?;

    Ok(Settings {
        bind,
        advertised,
        ring,
    })
}

fn default_bind() -> String {
    "0.0.0.0:4530".to_string()
}

fn advertised_addr(bind: SocketAddr) -> Result<SocketAddr> {
    if bind.ip().is_unspecified() {
        let ip: IpAddr = util::discover_local_ip()?;
        Ok(SocketAddr::new(ip, bind.port()))
    } else {
        Ok(bind)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_flags_override_file_defaults() {
        let cli = Cli::parse_from([
            "ringlet",
            "--bind",
            "10.0.0.9:4000",
            "--ring-bits",
            "16",
            "--peer",
            "10.0.0.1:4000",
        ]);
        let settings = load(&cli).unwrap();
        assert_eq!(settings.bind, "10.0.0.9:4000".parse().unwrap());
        assert_eq!(settings.advertised, settings.bind);
        assert_eq!(settings.ring.ring_bit_width, 16);
        assert_eq!(settings.ring.successor_list_length, 3);
        assert_eq!(
            settings.ring.bootstrap_peer_address.as_deref(),
            Some("10.0.0.1:4000")
        );
    }

    #[test]
    fn test_file_config_round_trip() {
        let parsed: FileConfig = toml::from_str(
            r#"
            bind_address = "10.0.0.7:4530"

            [ring]
            ring_bit_width = 32
            successor_list_length = 4
            maintenance_interval_seconds = 5
            "#,
        )
        .unwrap();
        assert_eq!(parsed.bind_address.as_deref(), Some("10.0.0.7:4530"));
        assert_eq!(parsed.ring.ring_bit_width, 32);
        assert_eq!(parsed.ring.successor_list_length, 4);
        assert_eq!(parsed.ring.maintenance_interval_seconds, 5);
        // Unset keys keep their defaults.
        assert_eq!(parsed.ring.rpc_deadline_seconds, 20);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let cli = Cli::parse_from(["ringlet", "--bind", "10.0.0.9:4000", "--successors", "0"]);
        assert!(load(&cli).is_err());
    }
}
