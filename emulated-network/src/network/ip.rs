use anyhow::{Context, anyhow, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// An IPv4 interface address together with its network prefix (e.g. `10.10.10.11/24`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    network_prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, network_prefix: u8) -> anyhow::Result<Self> {
        if network_prefix == 0 {
            bail!("network prefix cannot be 0");
        }
        if network_prefix > 32 {
            bail!("network prefix cannot be higher than 32");
        }

        Ok(Self {
            address,
            network_prefix,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn network_prefix(&self) -> u8 {
        self.network_prefix
    }

    fn mask(&self) -> u32 {
        u32::MAX << (32 - self.network_prefix)
    }

    /// The network address of the subnet (all host bits cleared)
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address.to_bits() & self.mask())
    }

    /// The broadcast address of the subnet (all host bits set)
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address.to_bits() | !self.mask())
    }

    /// The lowest address in the subnet that can be assigned to an interface.
    ///
    /// For regular subnets this is the address right after the network address (the `.1` of a
    /// `/24`). Point-to-point (`/31`) and singleton (`/32`) subnets have no reserved network
    /// address, so their first address is usable as-is.
    pub fn first_usable(&self) -> Ipv4Addr {
        if self.network_prefix >= 31 {
            self.network()
        } else {
            Ipv4Addr::from_bits(self.network().to_bits() + 1)
        }
    }

    /// Whether the address is the network or broadcast address of its own subnet, which cannot
    /// be assigned to an interface
    pub fn is_reserved_address(&self) -> bool {
        self.network_prefix < 31
            && (self.address == self.network() || self.address == self.broadcast())
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.network_prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        let base_ip: IpAddr = parts
            .next()
            .ok_or(anyhow!("empty string"))?
            .parse()
            .context("invalid ip address")?;

        let IpAddr::V4(base_ip) = base_ip else {
            bail!("only IPv4 supported at the moment");
        };

        // A missing network prefix is interpreted as /32 (i.e. singleton subnet)
        let network_prefix: u8 = parts
            .next()
            .unwrap_or("32")
            .parse()
            .context("the provided network prefix is not a valid unsigned integer")?;

        if parts.next().is_some() {
            bail!("address contains trailing characters");
        }

        Self::new(base_ip, network_prefix)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_subnet_boundaries() {
        let cases = [
            ("10.10.10.11/24", "10.10.10.0", "10.10.10.255", "10.10.10.1"),
            ("10.20.10.10/24", "10.20.10.0", "10.20.10.255", "10.20.10.1"),
            ("10.0.0.123/8", "10.0.0.0", "10.255.255.255", "10.0.0.1"),
            ("20.0.0.5/12", "20.0.0.0", "20.15.255.255", "20.0.0.1"),
            ("192.168.1.7/31", "192.168.1.6", "192.168.1.7", "192.168.1.6"),
            ("192.168.1.7", "192.168.1.7", "192.168.1.7", "192.168.1.7"),
        ];

        for (input, network, broadcast, first_usable) in cases {
            let cidr = Ipv4Cidr::from_str(input).unwrap();
            assert_eq!(cidr.network().to_string(), network, "{input}");
            assert_eq!(cidr.broadcast().to_string(), broadcast, "{input}");
            assert_eq!(cidr.first_usable().to_string(), first_usable, "{input}");
        }
    }

    #[test]
    fn test_reserved_addresses() {
        assert!(Ipv4Cidr::from_str("10.10.10.0/24").unwrap().is_reserved_address());
        assert!(Ipv4Cidr::from_str("10.10.10.255/24").unwrap().is_reserved_address());
        assert!(!Ipv4Cidr::from_str("10.10.10.11/24").unwrap().is_reserved_address());
        assert!(!Ipv4Cidr::from_str("10.10.10.0/31").unwrap().is_reserved_address());
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["", "10.10.10/24", "10.10.10.1/0", "10.10.10.1/33", "10.0.0.1/24/1", "::1/64"] {
            assert!(Ipv4Cidr::from_str(input).is_err(), "{input} should not parse");
        }
    }
}
