//! Typed declaration of a GCP VPC topology: one network, public, private and
//! data subnets, a router with a NAT gateway, and ingress firewall rules.
//!
//! The topology is checked against its policy invariants, rendered as a
//! Terraform JSON declaration, and planned against a recorded state file.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod processing;
pub mod store;

use config::Settings;
use models::Topology;
use std::error::Error;

/// Load the topology from `path`, or build the reference topology when no path is given.
pub fn load_topology(path: Option<&str>, settings: &Settings) -> Result<Topology, Box<dyn Error>> {
    let topology = match path {
        Some(path) => store::read_topology(path)?,
        None => Topology::reference(settings)?,
    };
    log::debug!("{topology}");
    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reference_topology() {
        let topology = load_topology(None, &Settings::default()).unwrap();
        assert_eq!(topology.network.name, "prod-vpc");
        assert_eq!(topology.resources().len(), 11);
    }

    #[test]
    fn test_load_topology_file() {
        let topology = load_topology(
            Some("src/tests/test_data/topology_overlap.json"),
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(topology.network.name, "lab-vpc");
    }
}
