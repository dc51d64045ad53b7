//! Command-line interface.
//!
//! Argument parsing lives here rather than in `main.rs` so every command can
//! be driven from tests.

use crate::config::{Settings, DEFAULT_DECLARATION_FILE, DEFAULT_STATE_FILE};
use crate::load_topology;
use crate::models::{Packet, Protocol};
use crate::output::{
    format_check_report, format_order, format_plan, format_verdict, print_address_plan, render,
    write_declaration,
};
use crate::processing::{apply, evaluate, plan, run_checks, DependencyGraph};
use crate::store::{read_state, write_state, write_topology};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::net::Ipv4Addr;

/// Declare, check and plan a GCP VPC topology.
#[derive(Parser, Debug, Clone)]
#[command(name = "gcp-network-topology")]
#[command(version)]
#[command(about = "Declare, check and plan a GCP VPC topology", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Topology JSON file, the built-in reference topology when omitted
    #[arg(short, long, global = true, env = "TOPOLOGY_FILE")]
    pub topology: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write the Terraform JSON declaration ("-" for stdout)
    Render {
        #[arg(short, long, default_value = DEFAULT_DECLARATION_FILE)]
        out: String,
    },

    /// Run the policy checks, exit non-zero on errors
    Check,

    /// Show the apply order as waves of independent resources
    Order,

    /// Compare the topology with the recorded state
    Plan {
        #[arg(short, long, default_value = DEFAULT_STATE_FILE)]
        state: String,
    },

    /// Plan, then record the result in the state file
    Apply {
        #[arg(short, long, default_value = DEFAULT_STATE_FILE)]
        state: String,
    },

    /// Print the address plan with the gaps between subnets as CSV
    Addresses {
        /// Largest block reported for one gap row
        #[arg(short, long, default_value_t = 16)]
        gap_mask: u8,
    },

    /// Decide which firewall rule handles an inbound packet
    Evaluate {
        /// tcp, udp or icmp
        #[arg(short, long)]
        protocol: String,
        #[arg(long)]
        port: Option<u16>,
        #[arg(short, long)]
        source: Ipv4Addr,
        /// Network tag of the receiving instance, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Write the topology as JSON, to edit and load back with --topology
    Export {
        #[arg(short, long)]
        out: String,
    },
}

/// Run one command.
///
/// # Returns
/// * `Ok(true)` - The command succeeded
/// * `Ok(false)` - `check` found errors
/// * `Err` - The topology or a file could not be read or written
pub fn run(cli: &Cli, settings: &Settings) -> Result<bool, Box<dyn Error>> {
    let topology = load_topology(cli.topology.as_deref(), settings)?;
    log::info!("Running {:?}", cli.command);

    match &cli.command {
        Commands::Render { out } => {
            if out == "-" {
                let declaration = render(&topology, settings)?;
                println!("{}", serde_json::to_string_pretty(&declaration)?);
            } else {
                write_declaration(out, &topology, settings)?;
                println!("Wrote declaration to {out}");
            }
        }
        Commands::Check => {
            let report = run_checks(&topology);
            for line in format_check_report(&report) {
                println!("{line}");
            }
            return Ok(!report.has_errors());
        }
        Commands::Order => {
            let waves = DependencyGraph::build(&topology)?.waves()?;
            for line in format_order(&waves) {
                println!("{line}");
            }
        }
        Commands::Plan { state } => {
            let state = read_state(state)?;
            let changes = plan(&topology, &state)?;
            for line in format_plan(&changes) {
                println!("{line}");
            }
        }
        Commands::Apply { state: path } => {
            let report = run_checks(&topology);
            if report.has_errors() {
                for line in format_check_report(&report) {
                    println!("{line}");
                }
                return Err("Refusing to apply a topology that fails its checks".into());
            }
            let state = read_state(path)?;
            let changes = plan(&topology, &state)?;
            for line in format_plan(&changes) {
                println!("{line}");
            }
            if !changes.is_empty() {
                let state = apply(&changes, state);
                write_state(path, &state)?;
                println!("Apply complete! {}", changes.summary());
            }
        }
        Commands::Addresses { gap_mask } => print_address_plan(&topology, *gap_mask)?,
        Commands::Evaluate {
            protocol,
            port,
            source,
            tags,
        } => {
            let protocol: Protocol = protocol.parse()?;
            if protocol == Protocol::All {
                return Err("A packet has a concrete protocol: tcp, udp or icmp".into());
            }
            let tags: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
            let packet = Packet::ingress(protocol, *port, *source, &tags);
            let verdict = evaluate(&topology.firewall_rules, &packet);
            println!("{}", format_verdict(&verdict));
        }
        Commands::Export { out } => {
            write_topology(out, &topology)?;
            println!("Wrote topology to {out}");
        }
    }
    Ok(true)
}
