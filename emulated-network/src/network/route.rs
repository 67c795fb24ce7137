use anyhow::{Context, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// A host's default route, i.e. the gateway all non-local traffic is sent to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct DefaultRoute {
    pub via: Ipv4Addr,
}

impl DefaultRoute {
    pub fn via(gateway: Ipv4Addr) -> Self {
        Self { via: gateway }
    }
}

impl Display for DefaultRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "via {}", self.via)
    }
}

impl FromStr for DefaultRoute {
    type Err = anyhow::Error;

    // Accepts both `via 10.0.0.1` (the emulator's notation) and a bare `10.0.0.1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let gateway = match (parts.next(), parts.next()) {
            (Some("via"), Some(gateway)) => gateway,
            (Some(gateway), None) => gateway,
            (None, _) => bail!("empty route"),
            _ => bail!("expected `via <address>`"),
        };

        if parts.next().is_some() {
            bail!("route contains trailing characters");
        }

        let gateway: IpAddr = gateway.parse().context("invalid gateway address")?;
        let IpAddr::V4(gateway) = gateway else {
            bail!("only IPv4 supported at the moment");
        };

        Ok(Self::via(gateway))
    }
}

#[test]
fn test_default_route() {
    let cases = [
        ("via 10.10.10.1", "10.10.10.1"),
        ("10.20.10.1", "10.20.10.1"),
        ("  via   10.10.60.1 ", "10.10.60.1"),
    ];

    for (input, gateway) in cases {
        let route = DefaultRoute::from_str(input).unwrap();
        assert_eq!(route.via.to_string(), gateway);
        assert_eq!(route.to_string(), format!("via {gateway}"));
    }

    for input in ["", "via", "dev eth0", "via 10.0.0.1 dev eth0", "via fe80::1"] {
        assert!(DefaultRoute::from_str(input).is_err(), "{input} should not parse");
    }
}
