use crate::config::cli::ExportFormat;
use anyhow::Context;
use emulated_network::network::spec::Topology;
use std::fs;
use std::path::Path;

pub fn run(topology: &Topology, format: ExportFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let rendered = match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(topology).context("failed to serialize topology")?
        }
        ExportFormat::Netem => netem_script(topology),
    };

    match output {
        Some(path) => fs::write(path, format!("{rendered}\n"))
            .with_context(|| format!("failed to write `{}`", path.display()))?,
        None => println!("{rendered}"),
    }

    Ok(())
}

/// One `tc qdisc` command per interface, shaping both directions of every link the same way
fn netem_script(topology: &Topology) -> String {
    let mut lines = Vec::new();
    for (link, (source_iface, target_iface)) in
        topology.links().iter().zip(topology.interface_names())
    {
        lines.push(format!(
            "# {} [{}]: {}",
            link.id(),
            link.profile(),
            link.params()
        ));

        let args = link.params().netem_args().join(" ");
        for iface in [source_iface, target_iface] {
            lines.push(format!("tc qdisc add dev {iface} root netem {args}"));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod test {
    use super::*;
    use emulated_network::registry::TopologyRegistry;

    #[test]
    fn test_netem_script_covers_both_ends() {
        let topology = TopologyRegistry::builtin()
            .unwrap()
            .build("urbanhospital")
            .unwrap();
        let script = netem_script(&topology);

        let commands: Vec<_> = script.lines().filter(|l| l.starts_with("tc ")).collect();
        assert_eq!(commands.len(), topology.links().len() * 2);
        assert!(
            script
                .lines()
                .any(|l| l.starts_with("# r-core<->r-clinic [wide-area]"))
        );
        assert!(commands.iter().any(|c| {
            c.starts_with("tc qdisc add dev r-core-eth")
                && c.ends_with("delay 20ms loss 0.1% rate 5000mbit")
        }));
    }
}
