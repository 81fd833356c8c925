//! Small helpers for the daemon.

use std::net::IpAddr;
use std::net::UdpSocket;

use crate::error::Result;

/// Discover the local IP peers can reach us at, by opening a UDP socket
/// towards a public address. No packet is sent.
pub fn discover_local_ip() -> Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_ip_is_not_wildcard() {
        // Hosts without a default route cannot discover anything; only
        // assert on the shape of a successful answer.
        if let Ok(ip) = discover_local_ip() {
            assert!(!ip.is_unspecified());
        }
    }
}
