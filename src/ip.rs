//! IPv4 <-> integer conversion and CIDR expansion.
//!
//! The rest of the crate works exclusively in the unsigned 32-bit integer
//! space described by the data model: an IP is `u32`, a CIDR is the closed
//! interval `[first_host, last_host]` in that space.

use ipnetwork::{IpNetwork, Ipv4Network};
use std::net::Ipv4Addr;

use crate::error::{CoreError, Result};

/// Parses a dotted-quad IPv4 address into its big-endian 32-bit integer form.
pub fn ip_to_int(ip: &str) -> Result<u32> {
    let addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| CoreError::invalid_input(format!("not a valid IPv4 address: {ip}")))?;
    Ok(u32::from(addr))
}

/// Inverse of [`ip_to_int`].
pub fn int_to_ip(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}

/// Expands a CIDR string (or bare IPv4 address, treated as a /32) to its
/// closed `[first_host, last_host]` interval. IPv6 input is rejected with
/// `Ok(None)` so callers can silently drop it, per spec.
pub fn cidr_to_range(input: &str) -> Result<Option<(u32, u32)>> {
    let trimmed = input.trim();

    if let Ok(network) = trimmed.parse::<IpNetwork>() {
        return Ok(match network {
            IpNetwork::V4(net) => Some(v4_network_range(&net)),
            IpNetwork::V6(_) => None,
        });
    }

    if let Ok(addr) = trimmed.parse::<Ipv4Addr>() {
        let n = u32::from(addr);
        return Ok(Some((n, n)));
    }

    // Not an IPv4/IPv6 literal at all (IPv6 CIDR without a mask, garbage, ...).
    if trimmed.parse::<std::net::Ipv6Addr>().is_ok() {
        return Ok(None);
    }

    Err(CoreError::invalid_input(format!(
        "not a CIDR or IPv4 address: {trimmed}"
    )))
}

fn v4_network_range(net: &Ipv4Network) -> (u32, u32) {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_dotted_quad() {
        for s in ["0.0.0.0", "255.255.255.255", "10.0.0.1", "192.168.1.254"] {
            let n = ip_to_int(s).unwrap();
            assert_eq!(int_to_ip(n), s);
        }
    }

    #[test]
    fn rejects_garbage_and_out_of_range_octets() {
        assert!(ip_to_int("not.an.ip").is_err());
        assert!(ip_to_int("256.1.1.1").is_err());
        assert!(ip_to_int("1.2.3").is_err());
    }

    #[test]
    fn expands_cidr_to_closed_range() {
        let (s, e) = cidr_to_range("10.0.0.0/24").unwrap().unwrap();
        assert_eq!(s, ip_to_int("10.0.0.0").unwrap());
        assert_eq!(e, ip_to_int("10.0.0.255").unwrap());
    }

    #[test]
    fn single_host_cidr_is_a_single_point_interval() {
        let (s, e) = cidr_to_range("1.1.1.1/32").unwrap().unwrap();
        assert_eq!(s, e);
        assert_eq!(s, ip_to_int("1.1.1.1").unwrap());
    }

    #[test]
    fn bare_address_is_treated_as_slash_32() {
        let (s, e) = cidr_to_range("1.1.1.1").unwrap().unwrap();
        assert_eq!(s, e);
    }

    #[test]
    fn ipv6_is_dropped_not_errored() {
        assert_eq!(cidr_to_range("2001:db8::/32").unwrap(), None);
        assert_eq!(cidr_to_range("::1").unwrap(), None);
    }
}
