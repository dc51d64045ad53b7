//! Recorded state of applied resources.
//!
//! The state file stands in for what the provisioning engine knows about
//! live resources, so plans can be computed without calling the cloud.

use crate::models::ResourceAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::path::Path;

/// What is known about one applied resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResourceState {
    /// Cloud-side name.
    pub name: String,
    pub attributes: BTreeMap<String, Value>,
    /// Addresses the resource referenced when it was applied.
    #[serde(default)]
    pub dependencies: BTreeSet<ResourceAddress>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct State {
    /// Incremented by every apply that changed something.
    pub serial: u64,
    pub generated_at: Option<DateTime<Utc>>,
    pub resources: BTreeMap<ResourceAddress, ResourceState>,
}

impl State {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, address: &ResourceAddress) -> Option<&ResourceState> {
        self.resources.get(address)
    }
}

/// Read state from `path`. A missing file is an empty state.
///
/// # Returns
/// * `Ok(State)` - The recorded state
/// * `Err` - If the file exists but cannot be read or parsed
pub fn read_state(path: &str) -> Result<State, Box<dyn Error>> {
    if !Path::new(path).exists() {
        log::warn!("State file not found: {path}, starting from empty state");
        return Ok(State::default());
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading state file {path}: {e}"))?;
    let mut deserializer = serde_json::Deserializer::from_str(&json);
    let state: State = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        format!(
            "Error parsing state file {path}: path={} error={}",
            e.path(),
            e
        )
    })?;
    log::info!(
        "Read state serial={} with {} resources from {path}",
        state.serial,
        state.resources.len()
    );
    Ok(state)
}

/// Write state to `path` as pretty JSON.
pub fn write_state(path: &str, state: &State) -> Result<(), Box<dyn Error>> {
    let json =
        serde_json::to_string_pretty(state).map_err(|e| format!("Error serializing state: {e}"))?;
    std::fs::write(path, json).map_err(|e| format!("Error writing state file {path}: {e}"))?;
    log::info!(
        "Wrote state serial={} with {} resources to {path}",
        state.serial,
        state.resources.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;

    #[test]
    fn test_missing_state_is_empty() {
        let state = read_state("src/tests/test_data/does_not_exist.json").unwrap();
        assert!(state.is_empty());
        assert_eq!(state.serial, 0);
    }

    #[test]
    fn test_read_state_fixture() {
        let state = read_state("src/tests/test_data/state_network_only.json")
            .expect("Error reading state fixture");
        assert_eq!(state.serial, 3);
        let vpc = ResourceAddress::new(ResourceKind::Network, "vpc");
        let network = state.get(&vpc).expect("network recorded");
        assert_eq!(network.name, "prod-vpc");
        assert_eq!(network.attributes["mtu"], 1460);
    }

    #[test]
    fn test_parse_error_reports_path() {
        let err = read_state("src/tests/test_data/state_bad_address.json").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("state_bad_address.json"), "{message}");
        assert!(message.contains("aws_vpc.main"), "{message}");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let path = path.to_str().unwrap();

        let mut state = State {
            serial: 7,
            ..Default::default()
        };
        state.resources.insert(
            ResourceAddress::new(ResourceKind::Router, "router"),
            ResourceState {
                name: "prod-router".to_string(),
                attributes: BTreeMap::from([("region".to_string(), Value::from("us-central1"))]),
                dependencies: BTreeSet::from([ResourceAddress::new(ResourceKind::Network, "vpc")]),
            },
        );
        write_state(path, &state).unwrap();
        assert_eq!(read_state(path).unwrap(), state);
    }
}
