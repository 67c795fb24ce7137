use anyhow::Context;
use emulated_network::network::builder::{DEFAULT_SITE, HostDecl, TopologyBuilder};
use emulated_network::network::link::{LinkConfig, LinkProfile};
use emulated_network::network::spec::Topology;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TopologyJson {
    name: String,
    /// Whether every host must declare a default route
    #[serde(default = "default_require_default_routes")]
    require_default_routes: bool,
    nodes: Vec<TopologyNodeJson>,
    #[serde(default)]
    links: Vec<TopologyLinkJson>,
}

fn default_require_default_routes() -> bool {
    true
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct TopologyNodeJson {
    id: String,
    #[serde(rename = "type")]
    kind: TopologyNodeKindJson,
    /// The site the node belongs to (`main` if not provided)
    site: Option<String>,
    /// The datapath id of a switch, as 16 hex digits
    dpid: Option<String>,
    /// The address of a host, in CIDR notation
    ip: Option<String>,
    /// The default route of a host, e.g. `via 10.0.1.1`
    default_route: Option<String>,
    /// The switch a host is attached to
    switch: Option<String>,
    /// The attachment link of a host (a LAN link of 1000 Mbps and 2 ms if not provided)
    link: Option<TopologyLinkParamsJson>,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
enum TopologyNodeKindJson {
    Switch,
    Router,
    Host,
}

#[derive(Deserialize, Clone)]
struct TopologyLinkJson {
    source: String,
    target: String,
    #[serde(flatten)]
    params: TopologyLinkParamsJson,
}

#[derive(Deserialize, Clone)]
struct TopologyLinkParamsJson {
    /// The link's bandwidth, in Mbps
    bw: f64,
    /// The one-way delay of the link, e.g. `2ms`
    delay: String,
    /// The ratio of packets that will be lost, in percent (between 0 and 100)
    #[serde(default)]
    loss: f64,
    /// The delay variation of the link, e.g. `1ms`
    jitter: Option<String>,
    #[serde(default)]
    profile: LinkProfile,
}

impl From<&TopologyLinkParamsJson> for LinkConfig {
    fn from(json: &TopologyLinkParamsJson) -> Self {
        LinkConfig::builder()
            .bandwidth_mbps(json.bw)
            .delay(json.delay.as_str())
            .loss_percent(json.loss)
            .maybe_jitter(json.jitter.clone())
            .profile(json.profile)
            .build()
    }
}

fn default_host_link() -> LinkConfig {
    LinkConfig::builder()
        .bandwidth_mbps(1000.0)
        .delay("2ms")
        .build()
}

impl TopologyJson {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read topology file `{}`", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("failed to parse topology file `{}`", path.display()))
    }

    /// Replays the file's declarations through a [`TopologyBuilder`], in file order.
    ///
    /// Hosts are linked to their switch right after being declared, so a host's switch must
    /// appear before the host.
    pub fn build(&self) -> anyhow::Result<Topology> {
        let mut builder = TopologyBuilder::new(&self.name);
        builder.require_default_routes(self.require_default_routes);

        for node in &self.nodes {
            builder.site(node.site.as_deref().unwrap_or(DEFAULT_SITE));
            match node.kind {
                TopologyNodeKindJson::Switch => {
                    let dpid = node
                        .dpid
                        .as_deref()
                        .with_context(|| format!("switch `{}` has no `dpid`", node.id))?;
                    builder.add_switch(&node.id, dpid)?;
                }
                TopologyNodeKindJson::Router => builder.add_router(&node.id)?,
                TopologyNodeKindJson::Host => {
                    let ip = node
                        .ip
                        .as_deref()
                        .with_context(|| format!("host `{}` has no `ip`", node.id))?;
                    let switch = node
                        .switch
                        .as_deref()
                        .with_context(|| format!("host `{}` has no `switch`", node.id))?;

                    builder.add_host(HostDecl {
                        id: &node.id,
                        ip,
                        default_route: node.default_route.as_deref(),
                        switch,
                    })?;

                    let link = node
                        .link
                        .as_ref()
                        .map(LinkConfig::from)
                        .unwrap_or_else(default_host_link);
                    builder.add_link(&node.id, switch, &link)?;
                }
            }
        }

        for link in &self.links {
            builder.add_link(&link.source, &link.target, &(&link.params).into())?;
        }

        Ok(builder.build()?)
    }
}
