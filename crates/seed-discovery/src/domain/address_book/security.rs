//! Address book security primitives.
//!
//! SECURITY-CRITICAL: bucket placement and routability filtering are the
//! anti-eclipse defenses of the book. Isolate for security audits.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use sha2::{Digest, Sha256};

/// Subnet group used to bound how much of the book one network range can
/// occupy. Stores /16 for IPv4 and /32 for IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub [u8; 5]);

impl GroupKey {
    /// Extract the group key from an IP address.
    ///
    /// The first byte tags the family so a v4 /16 never collides with a
    /// v6 /32. IPv4-mapped IPv6 addresses group as IPv4.
    pub fn from_ip(ip: &IpAddr) -> Self {
        match canonical(ip) {
            IpAddr::V4(v4) => {
                let o = v4.octets();
                GroupKey([4, o[0], o[1], 0, 0])
            }
            IpAddr::V6(v6) => {
                let o = v6.octets();
                GroupKey([6, o[0], o[1], o[2], o[3]])
            }
        }
    }
}

fn canonical(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(*v6),
        },
        v4 => *v4,
    }
}

/// Keyed hash for bucket placement.
///
/// # Security
/// SHA-256 over a secret 32-byte key followed by the parts. The key is
/// random per book and persisted with it, so placement is stable across
/// restarts but unpredictable to remote peers.
pub fn keyed_bucket_hash(key: &[u8; 32], parts: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(key);
    for part in parts {
        hasher.update((part.len() as u32).to_be_bytes());
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(out)
}

/// Whether the address is reachable on the public internet.
///
/// Strict mode uses this to reject loopback, private, link-local, shared
/// (CGNAT), documentation, benchmarking, multicast and reserved ranges.
pub fn is_routable(ip: &IpAddr) -> bool {
    match canonical(ip) {
        IpAddr::V4(v4) => is_routable_v4(&v4),
        IpAddr::V6(v6) => is_routable_v6(&v6),
    }
}

fn is_routable_v4(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_documentation()
        || o[0] == 0
        || (o[0] == 100 && (o[1] & 0xc0) == 64)
        || (o[0] == 198 && (o[1] & 0xfe) == 18)
        || (o[0] == 192 && o[1] == 0 && o[2] == 0)
        || o[0] >= 240)
}

fn is_routable_v6(ip: &Ipv6Addr) -> bool {
    let s = ip.segments();
    !(ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || (s[0] & 0xfe00) == 0xfc00
        || (s[0] & 0xffc0) == 0xfe80
        || (s[0] == 0x2001 && s[1] == 0x0db8)
        || (s[0] == 0x0100 && s[1] == 0 && s[2] == 0 && s[3] == 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_group_key_v4_uses_slash_16() {
        assert_eq!(GroupKey::from_ip(&ip("8.8.4.4")), GroupKey::from_ip(&ip("8.8.200.1")));
        assert_ne!(GroupKey::from_ip(&ip("8.8.4.4")), GroupKey::from_ip(&ip("8.9.4.4")));
        assert_eq!(
            GroupKey::from_ip(&ip("::ffff:8.8.4.4")),
            GroupKey::from_ip(&ip("8.8.1.1"))
        );
    }

    #[test]
    fn test_group_key_v6_uses_slash_32() {
        assert_eq!(
            GroupKey::from_ip(&ip("2001:4860:1::1")),
            GroupKey::from_ip(&ip("2001:4860:ffff::2"))
        );
        assert_ne!(
            GroupKey::from_ip(&ip("2001:4860::1")),
            GroupKey::from_ip(&ip("2001:4861::1"))
        );
    }

    #[test]
    fn test_keyed_hash_depends_on_key() {
        let a = keyed_bucket_hash(&[1u8; 32], &[b"addr"]);
        let b = keyed_bucket_hash(&[2u8; 32], &[b"addr"]);
        assert_eq!(a, keyed_bucket_hash(&[1u8; 32], &[b"addr"]));
        assert_ne!(a, b);
        // Length prefixes keep part boundaries significant.
        assert_ne!(
            keyed_bucket_hash(&[1u8; 32], &[b"ab", b"c"]),
            keyed_bucket_hash(&[1u8; 32], &[b"a", b"bc"])
        );
    }

    #[test]
    fn test_routability() {
        for routable in ["8.8.8.8", "1.2.3.4", "2001:4860::8888", "100.128.0.1"] {
            assert!(is_routable(&ip(routable)), "{routable} should be routable");
        }
        for reserved in [
            "0.0.0.0",
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.1.1",
            "100.64.0.1",
            "192.0.2.1",
            "198.18.0.1",
            "224.0.0.1",
            "255.255.255.255",
            "240.0.0.1",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "2001:db8::1",
            "ff02::1",
            "::ffff:10.0.0.1",
        ] {
            assert!(!is_routable(&ip(reserved)), "{reserved} should be rejected");
        }
    }
}
