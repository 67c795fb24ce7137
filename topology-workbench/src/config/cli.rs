use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the topologies that can be selected by name
    List,
    /// Print the nodes and links of a topology
    Show(TopologySource),
    /// Build and verify a topology, printing how each host reaches its router
    Check(TopologySource),
    /// Write the topology in a format an emulation engine can consume
    Export(ExportOpt),
    /// Print the commands each router runs when it is activated and torn down
    Plan(PlanOpt),
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TopologySource {
    /// The name of a registered topology (see the `list` command)
    #[arg(long)]
    pub topology: Option<String>,

    /// Path to the JSON file describing the topology
    #[arg(long)]
    pub topology_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportOpt {
    #[command(flatten)]
    pub source: TopologySource,

    /// The output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,

    /// The file the output should be written to (stdout if not provided)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanOpt {
    #[command(flatten)]
    pub source: TopologySource,

    /// Run the lifecycle for real, inside network namespaces named after each router (requires
    /// sudo, and the namespaces must already exist)
    #[arg(long)]
    pub apply: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// The full topology description
    Json,
    /// One `tc qdisc` command per link interface
    Netem,
}
