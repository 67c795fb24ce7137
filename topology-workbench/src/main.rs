mod config;
mod export;
mod plan;
mod util;

use crate::config::cli::{CliOpt, Command};
use clap::Parser;
use emulated_network::registry::TopologyRegistry;
use emulated_network::verify::verify;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr, so stdout only carries the command's output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = CliOpt::parse();
    let registry = TopologyRegistry::builtin()?;

    match &options.command {
        Command::List => util::print_registry(&registry),
        Command::Show(source) => {
            let topology = source.load(&registry)?;
            util::print_params(&topology, &source.describe());
            util::print_topology(&topology);
        }
        Command::Check(source) => {
            let topology = source.load(&registry)?;
            let verified = verify(&topology)?;
            util::print_params(&topology, &source.describe());
            util::print_verification(&topology, &verified);
        }
        Command::Export(opt) => {
            let topology = opt.source.load(&registry)?;
            export::run(&topology, opt.format, opt.output.as_deref())?;
        }
        Command::Plan(opt) => {
            let topology = opt.source.load(&registry)?;
            util::print_params(&topology, &opt.source.describe());
            if opt.apply {
                plan::apply(&topology)?;
            } else {
                plan::preview(&topology)?;
            }
        }
    }

    Ok(())
}
