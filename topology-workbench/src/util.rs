use emulated_network::network::spec::{NodeKind, NodeSpec, Topology};
use emulated_network::registry::TopologyRegistry;
use emulated_network::verify::VerifiedTopology;

pub fn print_registry(registry: &TopologyRegistry) {
    println!("--- Topologies ---");
    for name in registry.names() {
        let description = registry
            .get(name)
            .map(|d| d.description())
            .unwrap_or_default();
        println!("* {name}: {description}");
    }
}

pub fn print_params(topology: &Topology, source: &str) {
    println!("--- Params ---");
    println!("* Topology: {}", topology.name());
    println!("* Source: {source}");
    let sites: Vec<_> = topology.sites().into_iter().collect();
    println!("* Sites: {}", sites.join(", "));
}

pub fn print_topology(topology: &Topology) {
    println!("--- Nodes ---");
    for node in topology.nodes() {
        println!("* {}", describe_node(node));
    }

    println!("--- Links ---");
    for link in topology.links() {
        println!("* {} [{}]: {}", link.id(), link.profile(), link.params());
    }
}

fn describe_node(node: &NodeSpec) -> String {
    let details = match node.kind() {
        NodeKind::Switch { dpid } => format!(", dpid {dpid}"),
        NodeKind::Router => String::new(),
        NodeKind::Host {
            ip,
            default_route: Some(route),
        } => format!(", {ip} {route}"),
        NodeKind::Host {
            ip,
            default_route: None,
        } => format!(", {ip}"),
    };

    format!(
        "{} ({}, site {}{details})",
        node.id(),
        node.kind().name(),
        node.site()
    )
}

pub fn print_verification(topology: &Topology, verified: &VerifiedTopology) {
    println!("--- Summary ---");
    println!("* Routers: {}", topology.routers().count());
    println!("* Switches: {}", topology.switches().count());
    println!("* Hosts: {}", topology.hosts().count());
    println!(
        "* Links: {} ({} wide-area)",
        topology.links().len(),
        verified.wide_area_links.len()
    );
    for link_id in &verified.wide_area_links {
        println!("  * {link_id}");
    }

    println!("--- Gateways ---");
    for gateway in &verified.gateways {
        let via = gateway
            .gateway
            .map(|ip| format!("via {ip}"))
            .unwrap_or_else(|| "no default route".to_string());
        println!(
            "* {}: {via} -> {} -> {}",
            gateway.host_id, gateway.switch_id, gateway.router_id
        );
    }

    println!("All checks passed");
}
