use crate::config::cli::TopologySource;
use crate::config::network::TopologyJson;
use anyhow::bail;
use emulated_network::network::spec::Topology;
use emulated_network::registry::TopologyRegistry;

pub mod cli;
pub mod network;

impl TopologySource {
    /// Builds the selected topology, either from the registry or from a JSON file
    pub fn load(&self, registry: &TopologyRegistry) -> anyhow::Result<Topology> {
        match (&self.topology, &self.topology_file) {
            (Some(name), _) => Ok(registry.build(name)?),
            (None, Some(path)) => TopologyJson::load(path)?.build(),
            (None, None) => bail!("either `--topology` or `--topology-file` must be provided"),
        }
    }

    /// How the source was selected, for reporting purposes
    pub fn describe(&self) -> String {
        match (&self.topology, &self.topology_file) {
            (Some(name), _) => format!("registry ({name})"),
            (None, Some(path)) => format!("file ({})", path.display()),
            (None, None) => "none".to_string(),
        }
    }
}
