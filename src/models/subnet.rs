//! Subnet data model.

use super::{Ipv4, ResourceAddress, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a subnet plays in the topology.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SubnetTier {
    /// Hosts resources with their own public addressing or a load balancer. Never NATed.
    Public,
    /// Workloads without public addresses, egress through NAT.
    Private,
    /// Databases and storage, egress through NAT.
    Data,
}

impl SubnetTier {
    /// Whether instances in this tier reach the internet through the NAT gateway.
    pub fn uses_nat(&self) -> bool {
        !matches!(self, SubnetTier::Public)
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = match self {
            SubnetTier::Public => "public",
            SubnetTier::Private => "private",
            SubnetTier::Data => "data",
        };
        f.write_str(tier)
    }
}

/// Additional named range on a subnet (pods, services).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SecondaryRange {
    pub range_name: String,
    pub ip_cidr_range: Ipv4,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AggregationInterval {
    #[serde(rename = "INTERVAL_5_SEC")]
    Interval5Sec,
    #[serde(rename = "INTERVAL_30_SEC")]
    Interval30Sec,
    #[serde(rename = "INTERVAL_1_MIN")]
    Interval1Min,
    #[serde(rename = "INTERVAL_5_MIN")]
    Interval5Min,
    #[serde(rename = "INTERVAL_10_MIN")]
    Interval10Min,
    #[serde(rename = "INTERVAL_15_MIN")]
    Interval15Min,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogMetadata {
    IncludeAllMetadata,
    ExcludeAllMetadata,
}

/// Subnet-level flow log sampling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlowLogConfig {
    pub aggregation_interval: AggregationInterval,
    /// Fraction of flows sampled, in (0, 1].
    pub flow_sampling: f64,
    pub metadata: LogMetadata,
}

/// A subnet of the VPC.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Subnet {
    /// Local label in the declaration.
    pub label: String,
    pub name: String,
    pub tier: SubnetTier,
    /// Label of the owning network.
    pub network: String,
    pub ip_cidr_range: Ipv4,
    pub region: String,
    pub private_ip_google_access: bool,
    #[serde(default)]
    pub secondary_ip_range: Vec<SecondaryRange>,
    pub log_config: Option<FlowLogConfig>,
}

impl Subnet {
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Subnetwork, &self.label)
    }

    pub fn network_address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Network, &self.network)
    }

    /// Every range of the subnet, primary first, each with a display name.
    pub fn ranges(&self) -> Vec<(String, Ipv4)> {
        let mut ranges = vec![(self.name.clone(), self.ip_cidr_range)];
        ranges.extend(self.secondary_ip_range.iter().map(|r| {
            (
                format!("{}/{}", self.name, r.range_name),
                r.ip_cidr_range,
            )
        }));
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_subnet() -> Subnet {
        Subnet {
            label: "private".to_string(),
            name: "prod-private-subnet".to_string(),
            tier: SubnetTier::Private,
            network: "vpc".to_string(),
            ip_cidr_range: Ipv4::new("10.0.2.0/24").unwrap(),
            region: "us-central1".to_string(),
            private_ip_google_access: true,
            secondary_ip_range: vec![SecondaryRange {
                range_name: "pods".to_string(),
                ip_cidr_range: Ipv4::new("10.1.0.0/16").unwrap(),
            }],
            log_config: None,
        }
    }

    #[test]
    fn test_ranges_lists_primary_then_secondary() {
        let ranges = private_subnet().ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].0, "prod-private-subnet");
        assert_eq!(ranges[1].0, "prod-private-subnet/pods");
        assert_eq!(ranges[1].1.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_tier_nat_usage() {
        assert!(!SubnetTier::Public.uses_nat());
        assert!(SubnetTier::Private.uses_nat());
        assert!(SubnetTier::Data.uses_nat());
    }

    #[test]
    fn test_flow_log_serde_names() {
        let config = FlowLogConfig {
            aggregation_interval: AggregationInterval::Interval10Min,
            flow_sampling: 0.5,
            metadata: LogMetadata::IncludeAllMetadata,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["aggregation_interval"], "INTERVAL_10_MIN");
        assert_eq!(json["metadata"], "INCLUDE_ALL_METADATA");
        assert_eq!(json["flow_sampling"], 0.5);
    }

    #[test]
    fn test_addresses() {
        let subnet = private_subnet();
        assert_eq!(subnet.address().to_string(), "google_compute_subnetwork.private");
        assert_eq!(subnet.network_address().to_string(), "google_compute_network.vpc");
    }
}
