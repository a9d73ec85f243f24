// CIDR block parsing and family-aware containment checks

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrError {
    #[error("empty CIDR block")]
    Empty,

    #[error("invalid address in CIDR block '{0}'")]
    InvalidAddress(String),

    #[error("invalid prefix length in CIDR block '{0}'")]
    InvalidPrefix(String),
}

/// An address block such as `169.254.169.254/32` or `fd00:ec2::254/128`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    network: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// A block covering exactly one address
    pub fn host(ip: IpAddr) -> Self {
        Cidr {
            network: ip,
            prefix_len: max_prefix_len(ip),
        }
    }

    /// Whether `other` lies entirely within this block.
    ///
    /// Blocks of different address families never contain each other.
    pub fn contains(&self, other: &Cidr) -> bool {
        if other.prefix_len < self.prefix_len {
            return false;
        }

        match (self.network, other.network) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => ip_v4_matches(net, addr, self.prefix_len),
            (IpAddr::V6(net), IpAddr::V6(addr)) => ip_v6_matches(net, addr, self.prefix_len),
            _ => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CidrError::Empty);
        }

        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let network: IpAddr = addr
            .parse()
            .map_err(|_| CidrError::InvalidAddress(s.to_string()))?;

        // No prefix length means a single host
        let prefix_len = match prefix {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| CidrError::InvalidPrefix(s.to_string()))?,
            None => max_prefix_len(network),
        };

        if prefix_len > max_prefix_len(network) {
            return Err(CidrError::InvalidPrefix(s.to_string()));
        }

        // Host bits below the prefix are dropped: 10.1.2.3/8 is 10.0.0.0/8
        Ok(Cidr {
            network: mask_network(network, prefix_len),
            prefix_len,
        })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

fn max_prefix_len(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_network(ip: IpAddr, prefix_len: u8) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(prefix_len))),
        IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(prefix_len))),
    }
}

fn v4_mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        0xFFFFFFFF << (32 - prefix_len.min(32))
    }
}

fn v6_mask(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len.min(128))
    }
}

fn ip_v4_matches(network: Ipv4Addr, addr: Ipv4Addr, prefix_len: u8) -> bool {
    if prefix_len > 32 {
        return false;
    }

    let mask = v4_mask(prefix_len);
    (u32::from(network) & mask) == (u32::from(addr) & mask)
}

fn ip_v6_matches(network: Ipv6Addr, addr: Ipv6Addr, prefix_len: u8) -> bool {
    if prefix_len > 128 {
        return false;
    }

    let mask = v6_mask(prefix_len);
    (u128::from(network) & mask) == (u128::from(addr) & mask)
}
