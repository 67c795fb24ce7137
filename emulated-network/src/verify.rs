//! Graph-level checks over a built topology.
//!
//! These are the properties an emulation engine relies on once it has the description in hand:
//! every link can be materialized, every node is reachable, and every host's gateway is served
//! by exactly one router of its own site.

use crate::network::link::LinkProfile;
use crate::network::spec::{NodeKind, Topology};
use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTopology {
    #[error("link `{link_id}` references node `{node_id}`, which does not exist")]
    MissingNode { link_id: Arc<str>, node_id: Arc<str> },
    #[error("node `{node_id}` cannot be reached from node `{root_id}`")]
    Disconnected { node_id: Arc<str>, root_id: Arc<str> },
    #[error("site `{site}` has no router")]
    MissingRouter { site: Arc<str> },
    #[error("host `{host_id}` must be attached to exactly one switch, found {switches}")]
    HostAttachment { host_id: Arc<str>, switches: usize },
    #[error(
        "host `{host_id}` must reach exactly one router through switch `{switch_id}`, found {routers}"
    )]
    GatewayResolution {
        host_id: Arc<str>,
        switch_id: Arc<str>,
        routers: usize,
    },
    #[error(
        "host `{host_id}` of site `{site}` is served by router `{router_id}`, which belongs to site `{router_site}`"
    )]
    ForeignGateway {
        host_id: Arc<str>,
        site: Arc<str>,
        router_id: Arc<str>,
        router_site: Arc<str>,
    },
    #[error("expected {expected} wide-area links between {sites} sites, found {found}")]
    WideAreaLinkCount {
        sites: usize,
        expected: usize,
        found: usize,
    },
    #[error("wide-area link `{link_id}` must join routers of two different sites")]
    InvalidWideAreaLink { link_id: Arc<str> },
    #[error("link `{link_id}` joins sites `{a}` and `{b}` without being a wide-area link")]
    CrossSiteLink {
        link_id: Arc<str>,
        a: Arc<str>,
        b: Arc<str>,
    },
}

/// How a host reaches the rest of the network
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayResolution {
    pub host_id: Arc<str>,
    pub gateway: Option<Ipv4Addr>,
    pub switch_id: Arc<str>,
    pub router_id: Arc<str>,
}

/// The outcome of a successful verification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedTopology {
    /// One entry per host, in creation order
    pub gateways: Vec<GatewayResolution>,
    pub wide_area_links: Vec<Arc<str>>,
}

impl VerifiedTopology {
    pub fn gateway_of(&self, host_id: &str) -> Option<&GatewayResolution> {
        self.gateways.iter().find(|g| &*g.host_id == host_id)
    }
}

pub fn verify(topology: &Topology) -> Result<VerifiedTopology, InvalidTopology> {
    check_link_endpoints(topology)?;
    check_connected(topology)?;

    let sites = topology.sites();
    for site in &sites {
        if !topology.routers().any(|r| r.site() == site) {
            return Err(InvalidTopology::MissingRouter { site: site.clone() });
        }
    }

    let wide_area_links = check_wide_area_links(topology, sites.len())?;
    let gateways = resolve_gateways(topology)?;

    Ok(VerifiedTopology {
        gateways,
        wide_area_links,
    })
}

fn check_link_endpoints(topology: &Topology) -> Result<(), InvalidTopology> {
    for link in topology.links() {
        for endpoint in [link.source(), link.target()] {
            if topology.node(endpoint).is_none() {
                return Err(InvalidTopology::MissingNode {
                    link_id: link.id().clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    Ok(())
}

fn check_connected(topology: &Topology) -> Result<(), InvalidTopology> {
    let Some(root) = topology.nodes().first() else {
        return Ok(());
    };

    let mut visited = HashSet::from([root.id().clone()]);
    let mut queue = VecDeque::from([root.id().clone()]);
    while let Some(node_id) = queue.pop_front() {
        for neighbor in topology.neighbors(&node_id) {
            if visited.insert(neighbor.id().clone()) {
                queue.push_back(neighbor.id().clone());
            }
        }
    }

    match topology.nodes().iter().find(|n| !visited.contains(n.id())) {
        Some(node) => Err(InvalidTopology::Disconnected {
            node_id: node.id().clone(),
            root_id: root.id().clone(),
        }),
        None => Ok(()),
    }
}

fn check_wide_area_links(
    topology: &Topology,
    sites: usize,
) -> Result<Vec<Arc<str>>, InvalidTopology> {
    for link in topology.links() {
        let (Some(source), Some(target)) = (topology.node(link.source()), topology.node(link.target()))
        else {
            continue;
        };

        let crosses_sites = source.site() != target.site();
        match link.profile() {
            LinkProfile::WideArea if !crosses_sites || !source.is_router() || !target.is_router() => {
                return Err(InvalidTopology::InvalidWideAreaLink {
                    link_id: link.id().clone(),
                });
            }
            LinkProfile::WideArea => {}
            _ if crosses_sites => {
                return Err(InvalidTopology::CrossSiteLink {
                    link_id: link.id().clone(),
                    a: source.site().clone(),
                    b: target.site().clone(),
                });
            }
            _ => {}
        }
    }

    // Sites are joined in a tree: one link less than there are sites
    let wide_area_links: Vec<_> = topology.wide_area_links().map(|l| l.id().clone()).collect();
    let expected = sites.saturating_sub(1);
    if wide_area_links.len() != expected {
        return Err(InvalidTopology::WideAreaLinkCount {
            sites,
            expected,
            found: wide_area_links.len(),
        });
    }

    Ok(wide_area_links)
}

fn resolve_gateways(topology: &Topology) -> Result<Vec<GatewayResolution>, InvalidTopology> {
    let mut gateways = Vec::new();
    for host in topology.hosts() {
        let NodeKind::Host { default_route, .. } = host.kind() else {
            continue;
        };

        let switches: Vec<_> = topology
            .neighbors(host.id())
            .filter(|n| n.is_switch())
            .collect();
        let [switch] = switches[..] else {
            return Err(InvalidTopology::HostAttachment {
                host_id: host.id().clone(),
                switches: switches.len(),
            });
        };

        let routers: Vec<_> = topology
            .neighbors(switch.id())
            .filter(|n| n.is_router())
            .collect();
        let [router] = routers[..] else {
            return Err(InvalidTopology::GatewayResolution {
                host_id: host.id().clone(),
                switch_id: switch.id().clone(),
                routers: routers.len(),
            });
        };

        if router.site() != host.site() {
            return Err(InvalidTopology::ForeignGateway {
                host_id: host.id().clone(),
                site: host.site().clone(),
                router_id: router.id().clone(),
                router_site: router.site().clone(),
            });
        }

        gateways.push(GatewayResolution {
            host_id: host.id().clone(),
            gateway: default_route.map(|r| r.via),
            switch_id: switch.id().clone(),
            router_id: router.id().clone(),
        });
    }

    Ok(gateways)
}
