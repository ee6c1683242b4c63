use clap::{Parser, Subcommand};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use zonectl::config_loader::{self, CliOverrides};
use zonectl::orchestrator;

/// Zone assignment and scaling plans for cluster nodes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the store directory
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Override the node's private address
    #[arg(long, global = true)]
    private_ip: Option<Ipv4Addr>,

    /// Override the node's public address
    #[arg(long, global = true)]
    public_ip: Option<Ipv4Addr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register this node in the zone registry
    Register,

    /// Show how many overlay subnets are reserved
    Status {
        /// Number of nodes the cluster is expected to have
        #[arg(long)]
        expected: usize,
    },

    /// Assign zone indices to unassigned nodes (singleton zone only)
    AssignZones {
        /// Wait for this many reserved subnets before assigning
        #[arg(long)]
        expected: Option<usize>,

        /// Assign even if not all expected subnets are reserved
        #[arg(long, requires = "expected")]
        force: bool,
    },

    /// Render the topology config document
    Render {
        /// Write the document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the per-zone subnet layout
    Subnets,

    /// Print the automation endpoint addresses of this node
    NodeNetwork,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut config = config_loader::load_or_default(args.config.as_deref())?;
    config_loader::apply_overrides(
        &mut config,
        &CliOverrides {
            store_path: args.store,
            private_ip: args.private_ip,
            public_ip: args.public_ip,
        },
    )?;
    info!("Using store at {:?}", config.store.path);

    match args.command {
        Command::Register => {
            let record = orchestrator::register_node(&config)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Status { expected } => {
            let status = orchestrator::cluster_status(&config, expected)?;
            println!(
                "{} {}",
                if status.is_ready() { "ready" } else { "waiting" },
                status.progress()
            );
        }
        Command::AssignZones { expected, force } => {
            let report = orchestrator::assign_zones(&config, expected, force)?;
            for (ip, index) in &report.assigned {
                println!("{} -> {}{}", ip, config.network.zone_prefix, index);
            }
        }
        Command::Render { output } => {
            let json = orchestrator::publish_topology(&config, output.as_deref())?;
            if output.is_none() {
                println!("{}", json);
            }
        }
        Command::Subnets => {
            let layout = orchestrator::zone_subnets(&config)?;
            println!("{}", serde_json::to_string_pretty(&layout)?);
        }
        Command::NodeNetwork => {
            let network = orchestrator::node_network(&config)?;
            println!("{}", serde_json::to_string_pretty(&network)?);
        }
    }

    Ok(())
}
