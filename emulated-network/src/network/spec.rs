use crate::network::datapath::DatapathId;
use crate::network::ip::Ipv4Cidr;
use crate::network::link::{LinkProfile, LinkSpec};
use crate::network::route::DefaultRoute;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A node of a built topology
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeSpec {
    pub(crate) id: Arc<str>,
    pub(crate) site: Arc<str>,
    #[serde(flatten)]
    pub(crate) kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    Switch {
        dpid: DatapathId,
    },
    /// Routers have no addresses of their own, they only forward between their links
    Router,
    Host {
        ip: Ipv4Cidr,
        #[serde(rename = "defaultRoute", skip_serializing_if = "Option::is_none")]
        default_route: Option<DefaultRoute>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Switch { .. } => "switch",
            NodeKind::Router => "router",
            NodeKind::Host { .. } => "host",
        }
    }
}

impl NodeSpec {
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn site(&self) -> &Arc<str> {
        &self.site
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, NodeKind::Switch { .. })
    }

    pub fn is_router(&self) -> bool {
        matches!(self.kind, NodeKind::Router)
    }

    pub fn is_host(&self) -> bool {
        matches!(self.kind, NodeKind::Host { .. })
    }
}

/// A fully built, validated network description, ready to be handed to an emulation engine.
///
/// Topologies can only be obtained through [`crate::network::builder::TopologyBuilder::build`]
/// and cannot be modified afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Topology {
    pub(crate) name: Arc<str>,
    /// Nodes, in creation order
    pub(crate) nodes: Vec<NodeSpec>,
    /// Links, in creation order
    pub(crate) links: Vec<LinkSpec>,
    /// Map from node ids to their position in `nodes`
    #[serde(skip)]
    pub(crate) node_index: HashMap<Arc<str>, usize>,
}

impl Topology {
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn link(&self, id: &str) -> Option<&LinkSpec> {
        self.links.iter().find(|l| &*l.id == id)
    }

    pub fn switches(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.is_switch())
    }

    pub fn routers(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.is_router())
    }

    pub fn hosts(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.is_host())
    }

    /// Site names, sorted
    pub fn sites(&self) -> BTreeSet<Arc<str>> {
        self.nodes.iter().map(|n| n.site.clone()).collect()
    }

    pub fn links_of<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a LinkSpec> + 'a {
        self.links.iter().filter(move |l| l.connects(node_id))
    }

    /// The nodes directly attached to `node_id`, in link creation order
    pub fn neighbors<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a NodeSpec> + 'a {
        self.links_of(node_id)
            .filter_map(move |l| l.other_end(node_id))
            .filter_map(move |id| self.node(id))
    }

    pub fn wide_area_links(&self) -> impl Iterator<Item = &LinkSpec> {
        self.links
            .iter()
            .filter(|l| l.profile == LinkProfile::WideArea)
    }

    /// Interface names an engine would create for each link, as `(source_iface, target_iface)`.
    ///
    /// Interfaces are numbered per node, in link creation order (`<node>-eth0`, `<node>-eth1`,
    /// ...).
    pub fn interface_names(&self) -> Vec<(String, String)> {
        let mut next_port = HashMap::new();
        self.links
            .iter()
            .map(|l| {
                let source = allocate_interface(&mut next_port, &l.source);
                let target = allocate_interface(&mut next_port, &l.target);
                (source, target)
            })
            .collect()
    }
}

fn allocate_interface<'a>(next_port: &mut HashMap<&'a str, usize>, node_id: &'a str) -> String {
    let port = next_port.entry(node_id).or_default();
    let name = format!("{node_id}-eth{port}");
    *port += 1;
    name
}
