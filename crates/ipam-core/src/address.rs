//! IPv4 address arithmetic
//!
//! Addresses are handled as four big-endian octets. Offsets carry (or borrow)
//! from the least significant octet leftward, the way the pool walks a range.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::IpamError;

/// An IPv4 address as four octets, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpAddress([u8; 4]);

impl IpAddress {
    pub const fn new(octets: [u8; 4]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    /// Address `n` steps away. Negative `n` walks downward.
    ///
    /// Carries past the most significant octet are dropped, so stepping off
    /// either end of the address space wraps.
    #[must_use]
    pub fn increase_by(&self, n: i64) -> Self {
        let mut octets = self.0;
        let mut carry = n;
        for octet in octets.iter_mut().rev() {
            let sum = carry + i64::from(*octet);
            // rem_euclid keeps the digit in 0..=255 even when borrowing
            *octet = sum.rem_euclid(256) as u8;
            carry = sum.div_euclid(256);
        }
        Self(octets)
    }

    /// Strict octet-wise ordering: the first differing octet decides.
    pub fn less_than(&self, other: &Self) -> bool {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            if a != b {
                return a < b;
            }
        }
        false
    }

    /// Top address of the network containing `self` under `mask`.
    #[must_use]
    pub fn broadcast(&self, mask: IpAddress) -> Self {
        let mut octets = self.0;
        for (octet, m) in octets.iter_mut().zip(mask.0) {
            *octet |= !m;
        }
        Self(octets)
    }

    /// Base address of the network containing `self` under `mask`.
    #[must_use]
    pub fn network(&self, mask: IpAddress) -> Self {
        let mut octets = self.0;
        for (octet, m) in octets.iter_mut().zip(mask.0) {
            *octet &= m;
        }
        Self(octets)
    }

    /// Netmask with the `prefix_len` high bits set. Lengths above 32 saturate.
    pub fn mask(prefix_len: u8) -> Self {
        let bits = match prefix_len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len.min(32))),
        };
        Self(bits.to_be_bytes())
    }
}

impl PartialOrd for IpAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IpAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.less_than(other) {
            std::cmp::Ordering::Less
        } else if other.less_than(self) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        Self(addr.octets())
    }
}

impl From<IpAddress> for Ipv4Addr {
    fn from(addr: IpAddress) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

/// Parses dotted-quad form. A trailing prefix length, as NetBox renders
/// addresses ("10.1.1.2/24"), is accepted and dropped.
impl FromStr for IpAddress {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, prefix_len) = match s.split_once('/') {
            Some((host, len)) => (host, Some(len)),
            None => (s, None),
        };

        if let Some(len) = prefix_len {
            match len.parse::<u8>() {
                Ok(len) if len <= 32 => {}
                _ => return Err(IpamError::Config(format!("invalid prefix length in address {s:?}"))),
            }
        }

        host.trim()
            .parse::<Ipv4Addr>()
            .map(Self::from)
            .map_err(|e| IpamError::Config(format!("invalid IPv4 address {s:?}: {e}")))
    }
}

/// A pool candidate together with its lease state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub ip: IpAddress,
    pub allocated: bool,
    /// Handle of the matching record in the external IPAM, if any
    pub external_ref: Option<ExternalRef>,
}

/// Opaque handle a driver uses to find its own record for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalRef(u64);

impl ExternalRef {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_increase_by_carries_and_borrows() {
        let base = ip("10.1.1.2");
        let cases = [
            (50, "10.1.1.52"),
            (253, "10.1.1.255"),
            (254, "10.1.2.0"),
            (255, "10.1.2.1"),
            (65536, "10.2.1.2"),
            (-1, "10.1.1.1"),
            (-3, "10.1.0.255"),
            (-259, "10.0.255.255"),
            (-65535, "10.0.1.3"),
        ];
        for (n, expected) in cases {
            assert_eq!(base.increase_by(n).to_string(), expected, "10.1.1.2 + {n}");
        }
    }

    #[test]
    fn test_increase_by_inverse() {
        let base = ip("172.16.40.9");
        for n in [0, 1, 7, 255, 256, 4095, 70000, -1, -300, -70000] {
            assert_eq!(base.increase_by(n).increase_by(-n), base, "offset {n}");
        }
    }

    #[test]
    fn test_less_than() {
        let a = ip("10.1.1.2");
        let b = ip("10.1.2.1");
        assert!(a.less_than(&b));
        assert!(!b.less_than(&a));
        assert!(!a.less_than(&a));
        assert!(ip("9.255.255.255").less_than(&ip("10.0.0.0")));
        assert!(a < b);
    }

    #[test]
    fn test_broadcast_and_network() {
        let base = ip("10.1.1.1");
        assert_eq!(base.broadcast(IpAddress::mask(25)), ip("10.1.1.127"));
        assert_eq!(base.broadcast(IpAddress::mask(24)), ip("10.1.1.255"));
        assert_eq!(ip("10.1.1.200").network(IpAddress::mask(25)), ip("10.1.1.128"));
        assert_eq!(IpAddress::mask(0), ip("0.0.0.0"));
        assert_eq!(IpAddress::mask(32), ip("255.255.255.255"));
        assert_eq!(IpAddress::mask(20), ip("255.255.240.0"));
    }

    #[test]
    fn test_parse() {
        assert_eq!(ip("10.1.1.2/24"), ip("10.1.1.2"));
        assert!("10.1.1".parse::<IpAddress>().is_err());
        assert!("10.1.1.2/33".parse::<IpAddress>().is_err());
        assert!("fe80::1".parse::<IpAddress>().is_err());
        assert!(matches!("bogus".parse::<IpAddress>(), Err(IpamError::Config(_))));
    }
}
