//! Text bodies shared by every wire encoding.
//!
//! A single address is its literal `host:port` form; a list joins its
//! elements with CRLF. Ids travel as fixed-width lowercase hex.

use std::net::SocketAddr;

use crate::dht::RingId;
use crate::error::Error;
use crate::error::Result;

pub const CRLF: &str = "\r\n";

pub fn encode_addr(addr: &SocketAddr) -> String {
    addr.to_string()
}

pub fn parse_addr(text: &str) -> Result<SocketAddr> {
    text.trim()
        .parse()
        .map_err(|_| Error::Malformed(format!("invalid address: {text:?}")))
}

pub fn encode_addrs(addrs: &[SocketAddr]) -> String {
    addrs
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(CRLF)
}

pub fn parse_addrs(text: &str) -> Result<Vec<SocketAddr>> {
    text.split(CRLF)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_addr)
        .collect()
}

pub fn encode_ids(ids: &[RingId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(CRLF)
}

pub fn parse_id(text: &str, bits: usize) -> Result<RingId> {
    RingId::from_hex(text.trim(), bits)
}

pub fn parse_ids(text: &str, bits: usize) -> Result<Vec<RingId>> {
    text.split(CRLF)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| parse_id(line, bits))
        .collect()
}
