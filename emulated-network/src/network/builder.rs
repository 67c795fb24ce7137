use crate::network::datapath::DatapathId;
use crate::network::ip::Ipv4Cidr;
use crate::network::link::{
    InvalidLinkParameters, LINK_ID_SEPARATOR, LinkConfig, LinkProfile, LinkSpec, TcDuration,
};
use crate::network::route::DefaultRoute;
use crate::network::spec::{NodeKind, NodeSpec, Topology};
use crate::verify::{InvalidTopology, verify};
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound for the delay of a LAN link
pub const MAX_LAN_DELAY: Duration = Duration::from_millis(2);

/// Site nodes are assigned to until [`TopologyBuilder::site`] is called
pub const DEFAULT_SITE: &str = "main";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdentifierKind {
    Node,
    Datapath,
    Address,
    Link,
}

impl Display for IdentifierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdentifierKind::Node => "node",
            IdentifierKind::Datapath => "datapath",
            IdentifierKind::Address => "address",
            IdentifierKind::Link => "link",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("link `{link_id}` has invalid parameters: {error}")]
    InvalidLinkParameters {
        link_id: Arc<str>,
        error: InvalidLinkParameters,
    },
    #[error("duplicate {kind} identifier `{id}`")]
    DuplicateIdentifier { kind: IdentifierKind, id: Arc<str> },
    #[error("node id `{node_id}` is invalid: {reason}")]
    InvalidNodeId { node_id: Arc<str>, reason: String },
    #[error("`{referrer}` references node `{missing}`, which has not been created")]
    DanglingReference {
        referrer: Arc<str>,
        missing: Arc<str>,
    },
    #[error(
        "host `{host_id}` routes via {gateway}, but the first usable address of its subnet {subnet} is {expected}"
    )]
    GatewayMismatch {
        host_id: Arc<str>,
        gateway: Ipv4Addr,
        expected: Ipv4Addr,
        subnet: Ipv4Cidr,
    },
    #[error("host `{host_id}` has no default route")]
    MissingDefaultRoute { host_id: Arc<str> },
    #[error("node `{node_id}` has an invalid address `{value}`: {reason}")]
    InvalidAddress {
        node_id: Arc<str>,
        value: String,
        reason: String,
    },
    #[error("switch `{switch_id}` has an invalid datapath id `{value}`: {reason}")]
    InvalidDatapathId {
        switch_id: Arc<str>,
        value: String,
        reason: String,
    },
    #[error("node `{node_id}` cannot be linked to itself")]
    SelfLink { node_id: Arc<str> },
    #[error("host `{host_id}` belongs to switch `{switch_id}`, but no link joins them")]
    UnattachedHost {
        host_id: Arc<str>,
        switch_id: Arc<str>,
    },
    #[error("{profile} link `{link_id}` {reason}")]
    ProfileViolation {
        link_id: Arc<str>,
        profile: LinkProfile,
        reason: String,
    },
    #[error(transparent)]
    InvalidTopology(#[from] InvalidTopology),
}

/// A host as declared by a topology definition
#[derive(Clone, Debug)]
pub struct HostDecl<'a> {
    pub id: &'a str,
    /// Address and prefix, e.g. `10.10.10.11/24`
    pub ip: &'a str,
    /// Either `via <address>` or a bare address
    pub default_route: Option<&'a str>,
    /// The switch of the host's segment
    pub switch: &'a str,
}

/// Accumulates nodes and links while a topology is being declared.
///
/// Every call checks what it can right away, so the first mistake in a definition is the one
/// reported. Calling [`TopologyBuilder::build`] runs the checks that need the whole graph and
/// freezes the result.
pub struct TopologyBuilder {
    name: Arc<str>,
    site: Arc<str>,
    require_default_routes: bool,
    nodes: Vec<NodeSpec>,
    node_index: HashMap<Arc<str>, usize>,
    datapaths: HashMap<DatapathId, Arc<str>>,
    host_addresses: HashMap<Ipv4Addr, Arc<str>>,
    /// Hosts, paired with the switch of their segment
    host_switches: Vec<(Arc<str>, Arc<str>)>,
    links: Vec<LinkSpec>,
    linked_pairs: HashSet<(Arc<str>, Arc<str>)>,
}

impl TopologyBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            site: DEFAULT_SITE.into(),
            require_default_routes: true,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            datapaths: HashMap::new(),
            host_addresses: HashMap::new(),
            host_switches: Vec::new(),
            links: Vec::new(),
            linked_pairs: HashSet::new(),
        }
    }

    /// Assigns the nodes created from now on to `site`
    pub fn site(&mut self, site: &str) -> &mut Self {
        self.site = site.into();
        self
    }

    /// Whether hosts without a default route are rejected (the default)
    pub fn require_default_routes(&mut self, required: bool) -> &mut Self {
        self.require_default_routes = required;
        self
    }

    pub fn add_switch(&mut self, id: &str, dpid: &str) -> Result<(), BuildError> {
        let id: Arc<str> = id.into();
        let dpid: DatapathId = dpid.parse().map_err(|e| BuildError::InvalidDatapathId {
            switch_id: id.clone(),
            value: dpid.to_string(),
            reason: format!("{e:#}"),
        })?;

        self.ensure_unique_node(&id)?;
        if self.datapaths.contains_key(&dpid) {
            return Err(BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Datapath,
                id: dpid.to_string().into(),
            });
        }

        self.datapaths.insert(dpid, id.clone());
        self.push_node(id, NodeKind::Switch { dpid });
        Ok(())
    }

    pub fn add_router(&mut self, id: &str) -> Result<(), BuildError> {
        let id: Arc<str> = id.into();
        self.ensure_unique_node(&id)?;
        self.push_node(id, NodeKind::Router);
        Ok(())
    }

    /// Adds a host and binds it to its segment's switch, which must already exist.
    ///
    /// The link between the two is added separately, through [`TopologyBuilder::add_link`].
    pub fn add_host(&mut self, host: HostDecl<'_>) -> Result<(), BuildError> {
        let id: Arc<str> = host.id.into();
        self.ensure_unique_node(&id)?;

        let switch_id = self.existing_node(&id, host.switch)?;

        let invalid_address = |value: &str, e: anyhow::Error| BuildError::InvalidAddress {
            node_id: id.clone(),
            value: value.to_string(),
            reason: format!("{e:#}"),
        };

        let ip: Ipv4Cidr = host.ip.parse().map_err(|e| invalid_address(host.ip, e))?;
        if ip.is_reserved_address() {
            return Err(BuildError::InvalidAddress {
                node_id: id.clone(),
                value: host.ip.to_string(),
                reason: "the network and broadcast addresses cannot be assigned to a host"
                    .to_string(),
            });
        }
        if ip.address() == ip.first_usable() {
            return Err(BuildError::InvalidAddress {
                node_id: id.clone(),
                value: host.ip.to_string(),
                reason: "the first usable address of a subnet belongs to its gateway".to_string(),
            });
        }

        let default_route = host
            .default_route
            .map(|route| {
                route
                    .parse::<DefaultRoute>()
                    .map_err(|e| invalid_address(route, e))
            })
            .transpose()?;

        match default_route {
            Some(route) if route.via != ip.first_usable() => {
                return Err(BuildError::GatewayMismatch {
                    host_id: id,
                    gateway: route.via,
                    expected: ip.first_usable(),
                    subnet: ip,
                });
            }
            None if self.require_default_routes => {
                return Err(BuildError::MissingDefaultRoute { host_id: id });
            }
            _ => {}
        }

        if self.host_addresses.contains_key(&ip.address()) {
            return Err(BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Address,
                id: ip.address().to_string().into(),
            });
        }

        self.host_addresses.insert(ip.address(), id.clone());
        self.host_switches.push((id.clone(), switch_id));
        self.push_node(id, NodeKind::Host { ip, default_route });
        Ok(())
    }

    /// Links two existing nodes, returning the id of the new link
    pub fn add_link(
        &mut self,
        source: &str,
        target: &str,
        config: &LinkConfig,
    ) -> Result<Arc<str>, BuildError> {
        let link_id = LinkSpec::id_for(source, target);
        let source = self.existing_node(&link_id, source)?;
        let target = self.existing_node(&link_id, target)?;

        if source == target {
            return Err(BuildError::SelfLink { node_id: source });
        }

        let pair = if source <= target {
            (source.clone(), target.clone())
        } else {
            (target.clone(), source.clone())
        };
        if self.linked_pairs.contains(&pair) {
            return Err(BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Link,
                id: link_id.clone(),
            });
        }

        let params = config
            .validate()
            .map_err(|error| BuildError::InvalidLinkParameters {
                link_id: link_id.clone(),
                error,
            })?;

        debug!(link = %link_id, profile = %config.profile, %params, "added link");
        self.linked_pairs.insert(pair);
        self.links.push(LinkSpec {
            id: link_id.clone(),
            source,
            target,
            profile: config.profile,
            params,
        });

        Ok(link_id)
    }

    /// Runs the whole-graph checks and freezes the topology
    pub fn build(self) -> Result<Topology, BuildError> {
        for (host_id, switch_id) in &self.host_switches {
            if !self.links.iter().any(|l| l.joins(host_id, switch_id)) {
                return Err(BuildError::UnattachedHost {
                    host_id: host_id.clone(),
                    switch_id: switch_id.clone(),
                });
            }
        }

        self.check_profiles()?;

        let topology = Topology {
            name: self.name,
            nodes: self.nodes,
            links: self.links,
            node_index: self.node_index,
        };
        verify(&topology)?;

        info!(
            topology = %topology.name,
            nodes = topology.nodes.len(),
            links = topology.links.len(),
            "topology built"
        );
        Ok(topology)
    }

    /// Checks that links deviating from the LAN profile are actually distinguishable from LAN
    /// links
    fn check_profiles(&self) -> Result<(), BuildError> {
        let lan_links = || self.links.iter().filter(|l| l.profile == LinkProfile::Lan);
        let max_lan_delay = lan_links().map(|l| l.params.delay()).max();
        let min_lan_bandwidth = lan_links()
            .map(|l| l.params.bandwidth_mbps())
            .min_by(f64::total_cmp);

        for link in &self.links {
            let params = &link.params;
            let reason = match link.profile {
                LinkProfile::Lan if params.loss_percent() > 0.0 => {
                    Some("must not lose packets".to_string())
                }
                LinkProfile::Lan if params.delay() > MAX_LAN_DELAY => Some(format!(
                    "must not be slower than {}",
                    TcDuration(MAX_LAN_DELAY)
                )),
                LinkProfile::Untrusted | LinkProfile::WideArea if params.loss_percent() == 0.0 => {
                    Some("must lose packets".to_string())
                }
                LinkProfile::Untrusted | LinkProfile::WideArea
                    if max_lan_delay.is_some_and(|max| params.delay() <= max) =>
                {
                    Some("must be slower than every LAN link".to_string())
                }
                LinkProfile::Constrained
                    if min_lan_bandwidth.is_some_and(|min| params.bandwidth_mbps() >= min) =>
                {
                    Some("must have less bandwidth than every LAN link".to_string())
                }
                _ => None,
            };

            if let Some(reason) = reason {
                return Err(BuildError::ProfileViolation {
                    link_id: link.id.clone(),
                    profile: link.profile,
                    reason,
                });
            }
        }

        Ok(())
    }

    fn ensure_unique_node(&self, id: &Arc<str>) -> Result<(), BuildError> {
        let invalid = |reason: &str| BuildError::InvalidNodeId {
            node_id: id.clone(),
            reason: reason.to_string(),
        };
        if id.is_empty() {
            return Err(invalid("must not be empty"));
        }
        // Link ids join node ids with the separator, so it must not appear in them
        if id.contains(LINK_ID_SEPARATOR) {
            return Err(invalid(&format!("must not contain `{LINK_ID_SEPARATOR}`")));
        }

        if self.node_index.contains_key(id) {
            return Err(BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Node,
                id: id.clone(),
            });
        }

        Ok(())
    }

    fn existing_node(&self, referrer: &Arc<str>, id: &str) -> Result<Arc<str>, BuildError> {
        match self.node_index.get(id) {
            Some(&i) => Ok(self.nodes[i].id.clone()),
            None => Err(BuildError::DanglingReference {
                referrer: referrer.clone(),
                missing: id.into(),
            }),
        }
    }

    fn push_node(&mut self, id: Arc<str>, kind: NodeKind) {
        debug!(node = %id, site = %self.site, kind = kind.name(), "added node");
        self.node_index.insert(id.clone(), self.nodes.len());
        self.nodes.push(NodeSpec {
            id,
            site: self.site.clone(),
            kind,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bon::builder;

    fn lan() -> LinkConfig {
        LinkConfig::builder()
            .bandwidth_mbps(1000.0)
            .delay("2ms")
            .build()
    }

    fn host<'a>(id: &'a str, ip: &'a str, gateway: &'a str, switch: &'a str) -> HostDecl<'a> {
        HostDecl {
            id,
            ip,
            default_route: Some(gateway),
            switch,
        }
    }

    /// Two sites with one router, one switch and one host each
    #[builder]
    fn two_sites(
        wan: Option<LinkConfig>,
        #[builder(default = "via 10.0.1.1")] gateway: &'static str,
    ) -> Result<Topology, BuildError> {
        let wan = wan.unwrap_or_else(|| {
            LinkConfig::builder()
                .bandwidth_mbps(100.0)
                .delay("20ms")
                .loss_percent(0.1)
                .profile(LinkProfile::WideArea)
                .build()
        });

        let mut builder = TopologyBuilder::new("two-sites");
        builder.site("a");
        builder.add_switch("s1", "0000000000000001")?;
        builder.add_router("r1")?;
        builder.add_host(host("h1", "10.0.1.10/24", gateway, "s1"))?;
        builder.add_link("r1", "s1", &lan())?;
        builder.add_link("h1", "s1", &lan())?;

        builder.site("b");
        builder.add_router("r2")?;
        builder.add_switch("s2", "0000000000000002")?;
        builder.add_host(host("h2", "10.0.2.10/24", "via 10.0.2.1", "s2"))?;
        builder.add_link("r2", "s2", &lan())?;
        builder.add_link("h2", "s2", &lan())?;

        builder.add_link("r1", "r2", &wan)?;
        builder.build()
    }

    #[test]
    fn test_build_two_sites() {
        let topology = two_sites().call().unwrap();

        assert_eq!(topology.nodes().len(), 6);
        assert_eq!(topology.links().len(), 5);
        assert_eq!(topology.node("h2").unwrap().site().as_ref(), "b");
        assert!(topology.link("r1<->r2").is_some());
    }

    #[test]
    fn test_rejects_duplicate_node() {
        let mut builder = TopologyBuilder::new("dup");
        builder.add_router("r1").unwrap();
        let error = builder.add_switch("r1", "0000000000000001").unwrap_err();
        assert_eq!(
            error,
            BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Node,
                id: "r1".into()
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_datapath() {
        let mut builder = TopologyBuilder::new("dup");
        builder.add_switch("s1", "0000000000000001").unwrap();
        let error = builder.add_switch("s2", "0000000000000001").unwrap_err();
        assert!(matches!(
            error,
            BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Datapath,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_malformed_datapath() {
        let mut builder = TopologyBuilder::new("bad");
        let error = builder.add_switch("s1", "1").unwrap_err();
        assert!(matches!(error, BuildError::InvalidDatapathId { .. }));
    }

    #[test]
    fn test_rejects_dangling_link() {
        let mut builder = TopologyBuilder::new("dangling");
        builder.add_router("r1").unwrap();
        let error = builder.add_link("r1", "s1", &lan()).unwrap_err();
        assert_eq!(
            error,
            BuildError::DanglingReference {
                referrer: "r1<->s1".into(),
                missing: "s1".into()
            }
        );
    }

    #[test]
    fn test_rejects_host_before_switch() {
        let mut builder = TopologyBuilder::new("dangling");
        let error = builder
            .add_host(host("h1", "10.0.1.10/24", "via 10.0.1.1", "s1"))
            .unwrap_err();
        assert!(matches!(error, BuildError::DanglingReference { .. }));
    }

    #[test]
    fn test_rejects_self_and_duplicate_links() {
        let mut builder = TopologyBuilder::new("links");
        builder.add_router("r1").unwrap();
        builder.add_switch("s1", "0000000000000001").unwrap();

        assert!(matches!(
            builder.add_link("r1", "r1", &lan()),
            Err(BuildError::SelfLink { .. })
        ));

        builder.add_link("r1", "s1", &lan()).unwrap();
        assert!(matches!(
            builder.add_link("s1", "r1", &lan()),
            Err(BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Link,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_link_parameters() {
        let cases = [
            LinkConfig::builder().bandwidth_mbps(0.0).delay("2ms").build(),
            LinkConfig::builder().bandwidth_mbps(-1.0).delay("2ms").build(),
            LinkConfig::builder()
                .bandwidth_mbps(1000.0)
                .delay("2ms")
                .loss_percent(101.0)
                .build(),
            LinkConfig::builder()
                .bandwidth_mbps(1000.0)
                .delay("-2ms")
                .build(),
        ];

        for config in cases {
            let error = two_sites().wan(config.clone()).call().unwrap_err();
            assert!(
                matches!(error, BuildError::InvalidLinkParameters { .. }),
                "{config:?} was accepted"
            );
        }
    }

    #[test]
    fn test_rejects_gateway_outside_first_usable() {
        for gateway in ["via 10.0.1.254", "via 10.0.9.1", "10.0.1.10"] {
            let error = two_sites().gateway(gateway).call().unwrap_err();
            assert!(
                matches!(error, BuildError::GatewayMismatch { .. }),
                "{gateway} was accepted"
            );
        }
    }

    #[test]
    fn test_missing_default_route() {
        let mut builder = TopologyBuilder::new("routes");
        builder.add_switch("s1", "0000000000000001").unwrap();
        let decl = HostDecl {
            id: "h1",
            ip: "10.0.1.10/24",
            default_route: None,
            switch: "s1",
        };

        let error = builder.add_host(decl.clone()).unwrap_err();
        assert!(matches!(error, BuildError::MissingDefaultRoute { .. }));

        builder.require_default_routes(false);
        builder.add_host(decl).unwrap();
    }

    #[test]
    fn test_rejects_reserved_and_duplicate_addresses() {
        let mut builder = TopologyBuilder::new("addresses");
        builder.add_switch("s1", "0000000000000001").unwrap();

        let error = builder
            .add_host(host("h0", "10.0.1.0/24", "via 10.0.1.1", "s1"))
            .unwrap_err();
        assert!(matches!(error, BuildError::InvalidAddress { .. }));

        builder
            .add_host(host("h1", "10.0.1.10/24", "via 10.0.1.1", "s1"))
            .unwrap();
        let error = builder
            .add_host(host("h2", "10.0.1.10/24", "via 10.0.1.1", "s1"))
            .unwrap_err();
        assert!(matches!(
            error,
            BuildError::DuplicateIdentifier {
                kind: IdentifierKind::Address,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_unattached_host() {
        let mut builder = TopologyBuilder::new("unattached");
        builder.add_switch("s1", "0000000000000001").unwrap();
        builder.add_router("r1").unwrap();
        builder
            .add_host(host("h1", "10.0.1.10/24", "via 10.0.1.1", "s1"))
            .unwrap();
        builder.add_link("r1", "s1", &lan()).unwrap();

        assert_eq!(
            builder.build().unwrap_err(),
            BuildError::UnattachedHost {
                host_id: "h1".into(),
                switch_id: "s1".into()
            }
        );
    }

    #[test]
    fn test_wide_area_link_must_be_degraded() {
        let lan_like = LinkConfig::builder()
            .bandwidth_mbps(1000.0)
            .delay("2ms")
            .loss_percent(0.1)
            .profile(LinkProfile::WideArea)
            .build();
        let error = two_sites().wan(lan_like).call().unwrap_err();
        assert!(matches!(
            error,
            BuildError::ProfileViolation {
                profile: LinkProfile::WideArea,
                ..
            }
        ));

        let lossless = LinkConfig::builder()
            .bandwidth_mbps(1000.0)
            .delay("20ms")
            .profile(LinkProfile::WideArea)
            .build();
        let error = two_sites().wan(lossless).call().unwrap_err();
        assert!(matches!(error, BuildError::ProfileViolation { .. }));
    }

    #[test]
    fn test_wide_area_link_is_required_between_sites() {
        let plain = LinkConfig::builder()
            .bandwidth_mbps(100.0)
            .delay("2ms")
            .build();
        let error = two_sites().wan(plain).call().unwrap_err();
        assert!(matches!(error, BuildError::InvalidTopology(_)));
    }

    #[test]
    fn test_rejects_host_on_gateway_address() {
        let mut builder = TopologyBuilder::new("gateways");
        builder.add_switch("s1", "0000000000000001").unwrap();

        for (ip, gateway) in [
            ("10.0.1.1/24", "via 10.0.1.1"),
            ("10.0.1.7/32", "via 10.0.1.7"),
            ("10.0.1.6/31", "via 10.0.1.6"),
        ] {
            let error = builder
                .add_host(host("h1", ip, gateway, "s1"))
                .unwrap_err();
            assert!(
                matches!(error, BuildError::InvalidAddress { .. }),
                "{ip} was accepted"
            );
        }

        builder.require_default_routes(false);
        let decl = HostDecl {
            id: "h1",
            ip: "10.0.1.1/24",
            default_route: None,
            switch: "s1",
        };
        assert!(matches!(
            builder.add_host(decl),
            Err(BuildError::InvalidAddress { .. })
        ));

        // The other end of a point-to-point subnet is fine
        builder
            .add_host(host("h1", "10.0.1.7/31", "via 10.0.1.6", "s1"))
            .unwrap();
    }

    #[test]
    fn test_rejects_ambiguous_node_ids() {
        let mut builder = TopologyBuilder::new("ids");
        for id in ["", "a<->b"] {
            assert!(
                matches!(builder.add_router(id), Err(BuildError::InvalidNodeId { .. })),
                "`{id}` was accepted"
            );
        }

        builder.add_switch("a", "0000000000000001").unwrap();
        let error = builder.add_switch("b<->c", "0000000000000002").unwrap_err();
        assert_eq!(
            error,
            BuildError::InvalidNodeId {
                node_id: "b<->c".into(),
                reason: "must not contain `<->`".to_string()
            }
        );
    }
}
