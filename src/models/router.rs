//! Cloud router and NAT gateway data model.

use super::{ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RouterBgp {
    pub asn: u32,
}

/// Regional router, used only as the attachment point of the NAT gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Router {
    pub label: String,
    pub name: String,
    /// Label of the owning network.
    pub network: String,
    pub region: String,
    pub bgp: Option<RouterBgp>,
}

impl Router {
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Router, &self.label)
    }

    pub fn network_address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Network, &self.network)
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NatIpAllocation {
    AutoOnly,
    ManualOnly,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubnetSelection {
    AllSubnetworksAllIpRanges,
    AllSubnetworksAllPrimaryIpRanges,
    ListOfSubnetworks,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceIpRanges {
    AllIpRanges,
    PrimaryIpRange,
    ListOfSecondaryIpRanges,
}

/// A subnet the NAT gateway translates for, with its address-range policy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NatSubnetwork {
    /// Label of the subnet.
    pub name: String,
    pub source_ip_ranges_to_nat: Vec<SourceIpRanges>,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NatLogFilter {
    ErrorsOnly,
    TranslationsOnly,
    All,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NatLogConfig {
    pub enable: bool,
    pub filter: NatLogFilter,
}

/// Managed NAT gateway attached to a router.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Nat {
    pub label: String,
    pub name: String,
    /// Label of the router.
    pub router: String,
    pub region: String,
    pub nat_ip_allocate_option: NatIpAllocation,
    pub source_subnetwork_ip_ranges_to_nat: SubnetSelection,
    pub subnetwork: Vec<NatSubnetwork>,
    pub log_config: Option<NatLogConfig>,
    /// Explicit ordering hints on top of attribute references.
    #[serde(default)]
    pub depends_on: Vec<ResourceAddress>,
}

impl Nat {
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::RouterNat, &self.label)
    }

    pub fn router_address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Router, &self.router)
    }

    /// Addresses of the subnets the gateway translates for.
    pub fn subnet_addresses(&self) -> Vec<ResourceAddress> {
        self.subnetwork
            .iter()
            .map(|s| ResourceAddress::new(ResourceKind::Subnetwork, &s.name))
            .collect()
    }

    /// Whether the gateway translates for the subnet with `label`.
    pub fn covers(&self, label: &str) -> bool {
        match self.source_subnetwork_ip_ranges_to_nat {
            SubnetSelection::ListOfSubnetworks => {
                self.subnetwork.iter().any(|s| s.name == label)
            }
            _ => true,
        }
    }
}
