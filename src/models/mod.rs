//! Domain models of the network topology.
//!
//! This module contains the core data structures used throughout the application:
//! - [`Ipv4`] - IPv4 CIDR block with range arithmetic
//! - [`Network`], [`Subnet`], [`Router`], [`Nat`], [`FirewallRule`] - declared resources
//! - [`Topology`] - the whole declaration and its per-resource view
//! - [`ResourceAddress`] - how the provisioning engine names a resource

mod address;
mod firewall;
mod ipv4;
mod network;
mod router;
mod subnet;
mod topology;

// Re-export public types
pub use address::{ResourceAddress, ResourceKind};
pub use firewall::{
    Direction, FirewallRule, Packet, PortRange, Protocol, ProtocolMatch, RuleAction,
};
pub use ipv4::{
    broadcast_addr, get_cidr_mask, ip_after_subnet, lo_mask, next_subnet_ipv4,
    num_gcp_hosts, Ipv4, GCP_RESERVED_ADDRESSES, MAX_LENGTH,
};
pub use network::{Network, RoutingMode};
pub use router::{
    Nat, NatIpAllocation, NatLogConfig, NatLogFilter, NatSubnetwork, Router, RouterBgp,
    SourceIpRanges, SubnetSelection,
};
pub use subnet::{AggregationInterval, FlowLogConfig, LogMetadata, SecondaryRange, Subnet, SubnetTier};
pub use topology::{Resource, Topology};
