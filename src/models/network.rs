//! VPC network data model.

use super::{Ipv4, ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingMode {
    Regional,
    Global,
}

/// A single isolated virtual network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Network {
    /// Local label in the declaration.
    pub label: String,
    pub name: String,
    pub description: String,
    /// Custom-mode networks never get provider-created subnets.
    pub auto_create_subnetworks: bool,
    pub mtu: u32,
    pub routing_mode: RoutingMode,
    /// Space every primary subnet range is carved from.
    /// Planning only, the provider has no such attribute.
    pub address_space: Ipv4,
}

impl Network {
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Network, &self.label)
    }
}
