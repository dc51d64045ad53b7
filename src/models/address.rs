//! Resource addresses (`<type>.<label>`) as the provisioning engine names them.

use crate::error::TopologyError;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource types declared by the topology.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Network,
    Subnetwork,
    Router,
    RouterNat,
    Firewall,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Network,
        ResourceKind::Subnetwork,
        ResourceKind::Router,
        ResourceKind::RouterNat,
        ResourceKind::Firewall,
    ];

    /// Provider resource type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Network => "google_compute_network",
            ResourceKind::Subnetwork => "google_compute_subnetwork",
            ResourceKind::Router => "google_compute_router",
            ResourceKind::RouterNat => "google_compute_router_nat",
            ResourceKind::Firewall => "google_compute_firewall",
        }
    }

    pub fn from_type_name(name: &str) -> Option<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.type_name() == name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Address of one declared resource, e.g. `google_compute_subnetwork.private`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceAddress {
    pub kind: ResourceKind,
    /// Local label inside the declaration (not the cloud-side name).
    pub label: String,
}

impl ResourceAddress {
    pub fn new(kind: ResourceKind, label: &str) -> ResourceAddress {
        ResourceAddress {
            kind,
            label: label.to_string(),
        }
    }

    /// Interpolation of one of this resource's attributes, e.g. `${google_compute_network.vpc.id}`.
    pub fn interpolate(&self, attribute: &str) -> String {
        format!("${{{self}.{attribute}}}")
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.label)
    }
}

impl FromStr for ResourceAddress {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_name, label) = s
            .split_once('.')
            .ok_or_else(|| TopologyError::InvalidAddress(s.to_string()))?;
        let kind = ResourceKind::from_type_name(type_name)
            .ok_or_else(|| TopologyError::InvalidAddress(s.to_string()))?;
        if label.is_empty() || label.contains('.') {
            return Err(TopologyError::InvalidAddress(s.to_string()));
        }
        Ok(ResourceAddress::new(kind, label))
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceAddress {
    fn deserialize<D>(deserializer: D) -> Result<ResourceAddress, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
