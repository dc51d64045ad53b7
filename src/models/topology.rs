//! The declared topology and its per-resource view.

use super::{
    AggregationInterval, Direction, FirewallRule, FlowLogConfig, Ipv4, LogMetadata, Nat,
    NatIpAllocation, NatLogConfig, NatLogFilter, NatSubnetwork, Network, Protocol,
    ProtocolMatch, ResourceAddress, Router, RouterBgp, RoutingMode, RuleAction, SecondaryRange,
    SourceIpRanges, Subnet, SubnetSelection, SubnetTier,
};
use crate::config::{self, Settings};
use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

/// Keys of the serialized models that are declaration metadata, not resource attributes.
const NON_ATTRIBUTE_KEYS: [&str; 4] = ["label", "tier", "address_space", "depends_on"];

/// One VPC with its subnets, router, NAT gateway and firewall rules.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Topology {
    pub network: Network,
    pub subnets: Vec<Subnet>,
    pub router: Router,
    pub nat: Nat,
    pub firewall_rules: Vec<FirewallRule>,
}

/// Borrowed view of one declared resource.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Network(&'a Network),
    Subnetwork(&'a Subnet),
    Router(&'a Router),
    RouterNat(&'a Nat),
    Firewall(&'a FirewallRule),
}

impl<'a> Resource<'a> {
    pub fn address(&self) -> ResourceAddress {
        match self {
            Resource::Network(n) => n.address(),
            Resource::Subnetwork(s) => s.address(),
            Resource::Router(r) => r.address(),
            Resource::RouterNat(n) => n.address(),
            Resource::Firewall(f) => f.address(),
        }
    }

    /// Cloud-side name.
    pub fn name(&self) -> &'a str {
        match self {
            Resource::Network(n) => &n.name,
            Resource::Subnetwork(s) => &s.name,
            Resource::Router(r) => &r.name,
            Resource::RouterNat(n) => &n.name,
            Resource::Firewall(f) => &f.name,
        }
    }

    /// Resources this one refers to, attribute references and explicit hints alike.
    pub fn references(&self) -> Vec<ResourceAddress> {
        match self {
            Resource::Network(_) => vec![],
            Resource::Subnetwork(s) => vec![s.network_address()],
            Resource::Router(r) => vec![r.network_address()],
            Resource::RouterNat(n) => {
                let mut refs = vec![n.router_address()];
                refs.extend(n.subnet_addresses());
                refs.extend(n.depends_on.iter().cloned());
                refs.sort();
                refs.dedup();
                refs
            }
            Resource::Firewall(f) => vec![f.network_address()],
        }
    }

    /// Flattened attribute map as recorded in state and compared by the planner.
    pub fn attributes(&self) -> Result<BTreeMap<String, Value>, TopologyError> {
        let value = match self {
            Resource::Network(n) => serde_json::to_value(n),
            Resource::Subnetwork(s) => serde_json::to_value(s),
            Resource::Router(r) => serde_json::to_value(r),
            Resource::RouterNat(n) => serde_json::to_value(n),
            Resource::Firewall(f) => serde_json::to_value(f),
        }
        .map_err(|source| TopologyError::Attributes {
            address: self.address(),
            source,
        })?;

        let object: Map<String, Value> = match value {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        Ok(object
            .into_iter()
            .filter(|(k, _)| !NON_ATTRIBUTE_KEYS.contains(&k.as_str()))
            .collect())
    }
}

impl Topology {
    /// The declared topology: VPC `10.0.0.0/16` with public, private and data subnets,
    /// NAT for the private and data subnets, and default-deny ingress.
    pub fn reference(settings: &Settings) -> Result<Topology, Box<dyn Error>> {
        let region = settings.region.as_str();
        let network = Network {
            label: "vpc".to_string(),
            name: settings.resource_name("vpc"),
            description: format!("{} VPC network", settings.environment),
            auto_create_subnetworks: false,
            mtu: config::DEFAULT_MTU,
            routing_mode: RoutingMode::Regional,
            address_space: Ipv4::new(config::VPC_ADDRESS_SPACE)?,
        };

        let flow_logs = FlowLogConfig {
            aggregation_interval: AggregationInterval::Interval10Min,
            flow_sampling: config::FLOW_LOG_SAMPLING,
            metadata: LogMetadata::IncludeAllMetadata,
        };
        let subnet = |tier: SubnetTier, cidr: &str| -> Result<Subnet, Box<dyn Error>> {
            Ok(Subnet {
                label: tier.to_string(),
                name: settings.resource_name(&format!("{tier}-subnet")),
                tier,
                network: network.label.clone(),
                ip_cidr_range: Ipv4::new(cidr)?,
                region: region.to_string(),
                private_ip_google_access: true,
                secondary_ip_range: vec![],
                log_config: Some(flow_logs.clone()),
            })
        };
        let public = subnet(SubnetTier::Public, config::PUBLIC_SUBNET_CIDR)?;
        let mut private = subnet(SubnetTier::Private, config::PRIVATE_SUBNET_CIDR)?;
        private.secondary_ip_range = vec![
            SecondaryRange {
                range_name: "pods".to_string(),
                ip_cidr_range: Ipv4::new(config::PODS_SECONDARY_CIDR)?,
            },
            SecondaryRange {
                range_name: "services".to_string(),
                ip_cidr_range: Ipv4::new(config::SERVICES_SECONDARY_CIDR)?,
            },
        ];
        let data = subnet(SubnetTier::Data, config::DATA_SUBNET_CIDR)?;

        let router = Router {
            label: "router".to_string(),
            name: settings.resource_name("router"),
            network: network.label.clone(),
            region: region.to_string(),
            bgp: Some(RouterBgp { asn: 64514 }),
        };

        let nat_subnets = [&private, &data];
        let nat = Nat {
            label: "nat".to_string(),
            name: settings.resource_name("nat"),
            router: router.label.clone(),
            region: region.to_string(),
            nat_ip_allocate_option: NatIpAllocation::AutoOnly,
            source_subnetwork_ip_ranges_to_nat: SubnetSelection::ListOfSubnetworks,
            subnetwork: nat_subnets
                .iter()
                .map(|s| NatSubnetwork {
                    name: s.label.clone(),
                    source_ip_ranges_to_nat: vec![SourceIpRanges::AllIpRanges],
                })
                .collect(),
            log_config: Some(NatLogConfig {
                enable: true,
                filter: NatLogFilter::ErrorsOnly,
            }),
            depends_on: nat_subnets.iter().map(|s| s.address()).collect(),
        };

        let firewall_rules = reference_firewall_rules(settings, &network)?;

        Ok(Topology {
            network,
            subnets: vec![public, private, data],
            router,
            nat,
            firewall_rules,
        })
    }

    /// Every declared resource, network first.
    pub fn resources(&self) -> Vec<Resource<'_>> {
        let mut resources = vec![Resource::Network(&self.network)];
        resources.extend(self.subnets.iter().map(Resource::Subnetwork));
        resources.push(Resource::Router(&self.router));
        resources.push(Resource::RouterNat(&self.nat));
        resources.extend(self.firewall_rules.iter().map(Resource::Firewall));
        resources
    }

    pub fn resource(&self, address: &ResourceAddress) -> Option<Resource<'_>> {
        self.resources()
            .into_iter()
            .find(|r| &r.address() == address)
    }

    pub fn subnet(&self, label: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.label == label)
    }

    pub fn ingress_rules(&self) -> Vec<&FirewallRule> {
        self.firewall_rules
            .iter()
            .filter(|r| r.direction == Direction::Ingress)
            .collect()
    }

    /// Every range of every subnet, primary and secondary.
    pub fn all_ranges(&self) -> Vec<(String, Ipv4)> {
        self.subnets.iter().flat_map(|s| s.ranges()).collect()
    }
}

fn reference_firewall_rules(
    settings: &Settings,
    network: &Network,
) -> Result<Vec<FirewallRule>, Box<dyn Error>> {
    let anywhere = vec![Ipv4::new(config::ANYWHERE)?];
    let rule = |label: &str, description: &str| FirewallRule {
        label: label.to_string(),
        name: settings.resource_name(&label.replace('_', "-")),
        network: network.label.clone(),
        description: description.to_string(),
        direction: Direction::Ingress,
        action: RuleAction::Allow,
        priority: None,
        rules: vec![],
        source_ranges: vec![],
        source_tags: vec![],
        destination_ranges: vec![],
        target_tags: vec![],
    };

    let allow_internal = FirewallRule {
        rules: vec![
            ProtocolMatch::any(Protocol::Tcp),
            ProtocolMatch::any(Protocol::Udp),
            ProtocolMatch::any(Protocol::Icmp),
        ],
        source_ranges: vec![network.address_space],
        ..rule("allow_internal", "Allow all traffic between instances of the VPC")
    };

    let allow_ssh_bastion = FirewallRule {
        rules: vec![ProtocolMatch::ports(Protocol::Tcp, &[config::SSH_PORT])],
        source_ranges: anywhere.clone(),
        target_tags: vec![config::BASTION_TAG.to_string()],
        ..rule("allow_ssh_bastion", "Allow SSH from anywhere to bastion hosts only")
    };

    let allow_health_checks = FirewallRule {
        rules: vec![ProtocolMatch::any(Protocol::Tcp)],
        source_ranges: config::HEALTH_CHECK_RANGES
            .iter()
            .map(|r| Ipv4::new(r))
            .collect::<Result<Vec<Ipv4>, _>>()?,
        ..rule(
            "allow_health_checks",
            "Allow load balancer health checks",
        )
    };

    let allow_http_https = FirewallRule {
        rules: vec![ProtocolMatch::ports(Protocol::Tcp, &[80, 443])],
        source_ranges: anywhere.clone(),
        target_tags: vec![config::WEB_TAG.to_string()],
        ..rule("allow_http_https", "Allow HTTP and HTTPS to web servers")
    };

    let deny_all_ingress = FirewallRule {
        action: RuleAction::Deny,
        priority: Some(config::DENY_ALL_PRIORITY),
        rules: vec![ProtocolMatch::any(Protocol::All)],
        source_ranges: anywhere,
        ..rule(
            "deny_all_ingress",
            "Deny all other ingress traffic (lowest precedence)",
        )
    };

    Ok(vec![
        allow_internal,
        allow_ssh_bastion,
        allow_health_checks,
        allow_http_https,
        deny_all_ingress,
    ])
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Network '{}' [{}] ({} subnets, {} firewall rules)",
            self.network.name,
            self.network.address_space,
            self.subnets.len(),
            self.firewall_rules.len()
        )?;
        for subnet in &self.subnets {
            writeln!(
                f,
                "  - {} {} {} ({})",
                subnet.tier, subnet.name, subnet.ip_cidr_range, subnet.region
            )?;
        }
        Ok(())
    }
}
