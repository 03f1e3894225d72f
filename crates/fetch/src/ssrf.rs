//! Outbound-fetch SSRF hardening, grounded on the teacher's `web.fetch`
//! skill private-IP checks. A blocked host is treated exactly like a
//! transport failure by the caller: the URL is skipped, the run continues.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(*v4),
        IpAddr::V6(v6) => is_private_v6(*v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || is_v4_shared_address(ip)
        || is_v4_documentation(ip)
        || is_v4_benchmarking(ip)
}

/// 100.64.0.0/10 (carrier-grade NAT).
fn is_v4_shared_address(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (octets[1] & 0b1100_0000) == 0b0100_0000
}

/// 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24.
fn is_v4_documentation(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    (o[0] == 192 && o[1] == 0 && o[2] == 2)
        || (o[0] == 198 && o[1] == 51 && o[2] == 100)
        || (o[0] == 203 && o[1] == 0 && o[2] == 113)
}

/// 198.18.0.0/15 (network benchmarking).
fn is_v4_benchmarking(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 198 && (o[1] == 18 || o[1] == 19)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified() || is_v6_unique_local(ip) || is_v6_link_local(ip)
}

/// fc00::/7.
fn is_v6_unique_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10.
fn is_v6_link_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Resolves the URL's host and scheme and rejects anything but http/https
/// pointing at a public address.
pub fn validate_url(raw_url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw_url).map_err(|e| format!("invalid url: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme: {other}")),
    }
    let host = parsed.host_str().ok_or_else(|| "missing host".to_string())?;
    let port = parsed.port_or_known_default().unwrap_or(80);

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("dns resolution failed: {e}"))?;
    let mut any = false;
    for addr in addrs {
        any = true;
        if is_private_ip(&addr.ip()) {
            return Err(format!("blocked private address: {}", addr.ip()));
        }
    }
    if !any {
        return Err("no addresses resolved".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_v4_is_private() {
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn rfc1918_is_private() {
        assert!(is_private_ip(&"10.0.0.5".parse().unwrap()));
        assert!(is_private_ip(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_ip(&"172.16.0.1".parse().unwrap()));
    }

    #[test]
    fn link_local_v4_is_private() {
        assert!(is_private_ip(&"169.254.1.1".parse().unwrap()));
    }

    #[test]
    fn cgnat_range_is_private() {
        assert!(is_private_ip(&"100.64.0.1".parse().unwrap()));
        assert!(!is_private_ip(&"100.128.0.1".parse().unwrap()));
    }

    #[test]
    fn documentation_ranges_are_private() {
        assert!(is_private_ip(&"192.0.2.1".parse().unwrap()));
        assert!(is_private_ip(&"198.51.100.1".parse().unwrap()));
        assert!(is_private_ip(&"203.0.113.1".parse().unwrap()));
    }

    #[test]
    fn benchmarking_range_is_private() {
        assert!(is_private_ip(&"198.18.0.1".parse().unwrap()));
        assert!(is_private_ip(&"198.19.255.1".parse().unwrap()));
        assert!(!is_private_ip(&"198.20.0.1".parse().unwrap()));
    }

    #[test]
    fn public_v4_is_not_private() {
        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn loopback_and_unique_local_v6_are_private() {
        assert!(is_private_ip(&"::1".parse().unwrap()));
        assert!(is_private_ip(&"fc00::1".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
    }

    #[test]
    fn public_v6_is_not_private() {
        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("ftp://example.com").is_err());
    }
}
