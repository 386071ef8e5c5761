//! CIDR ranges for linear-scan pools

use std::fmt;
use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::address::IpAddress;
use crate::error::IpamError;

/// A CIDR block with at least two usable host addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    network: IpAddress,
    prefix_len: u8,
}

impl AddressRange {
    pub fn network(&self) -> IpAddress {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn mask(&self) -> IpAddress {
        IpAddress::mask(self.prefix_len)
    }

    /// Lowest usable address (network + 1)
    pub fn first(&self) -> IpAddress {
        self.network.increase_by(1)
    }

    /// Broadcast address. Never handed out.
    pub fn broadcast(&self) -> IpAddress {
        self.network.broadcast(self.mask())
    }

    /// Highest usable address (broadcast - 1). Kept as a reserve by the
    /// linear scan, which stops before it.
    pub fn last(&self) -> IpAddress {
        self.broadcast().increase_by(-1)
    }

    /// Whether `ip` falls inside the block, network and broadcast included.
    pub fn contains(&self, ip: IpAddress) -> bool {
        ip.network(self.mask()) == self.network
    }

    /// Whether `ip` may be leased: inside the block and strictly between
    /// network and broadcast.
    pub fn is_usable(&self, ip: IpAddress) -> bool {
        self.contains(ip) && ip != self.network && ip != self.broadcast()
    }

    /// Number of host addresses, network and broadcast excluded
    pub fn usable_count(&self) -> u64 {
        (1u64 << (32 - u32::from(self.prefix_len))) - 2
    }
}

impl FromStr for AddressRange {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net: Ipv4Net = s
            .trim()
            .parse()
            .map_err(|e| IpamError::Config(format!("invalid range {s:?}: {e}")))?;

        if net.prefix_len() > 30 {
            return Err(IpamError::Config(format!(
                "range {s:?} leaves no usable host addresses"
            )));
        }

        Ok(Self {
            network: net.network().into(),
            prefix_len: net.prefix_len(),
        })
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}
