//! Topology declarations stored as JSON, in the same shape as [`Topology`].

use crate::models::Topology;
use std::error::Error;

/// Read a topology from `path`.
///
/// # Returns
/// * `Ok(Topology)` - The parsed declaration
/// * `Err` - If the file cannot be read, or the JSON path of the first parse error
pub fn read_topology(path: &str) -> Result<Topology, Box<dyn Error>> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading topology file {path}: {e}"))?;
    let mut deserializer = serde_json::Deserializer::from_str(&json);
    let topology: Topology = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        format!(
            "Error parsing topology file {path}: path={} error={}",
            e.path(),
            e.inner()
        )
    })?;
    log::info!(
        "Read topology '{}' with {} subnets and {} firewall rules from {path}",
        topology.network.name,
        topology.subnets.len(),
        topology.firewall_rules.len()
    );
    Ok(topology)
}

pub fn write_topology(path: &str, topology: &Topology) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(topology)
        .map_err(|e| format!("Error serializing topology: {e}"))?;
    std::fs::write(path, json).map_err(|e| format!("Error writing topology file {path}: {e}"))?;
    log::info!("Wrote topology to {path}");
    Ok(())
}
