//! Firewall rule data model and per-rule packet matching.

use super::{Ipv4, ResourceAddress, ResourceKind};
use crate::config::DEFAULT_FIREWALL_PRIORITY;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Ingress,
    Egress,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Deny,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    /// Matches every protocol.
    All,
}

impl Protocol {
    /// Whether port matchers apply to this protocol.
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }

    pub fn matches(&self, other: Protocol) -> bool {
        *self == Protocol::All || *self == other
    }
}

impl FromStr for Protocol {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            "all" => Ok(Protocol::All),
            other => Err(format!("Unknown protocol {other}").into()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
            Protocol::All => "all",
        };
        f.write_str(protocol)
    }
}

/// Inclusive port range, written `"22"` or `"8000-8080"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> PortRange {
        PortRange {
            start: port,
            end: port,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl FromStr for PortRange {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (start.parse::<u16>()?, end.parse::<u16>()?),
            None => {
                let port = s.parse::<u16>()?;
                (port, port)
            }
        };
        if start > end {
            return Err(format!("Invalid port range {s}").into());
        }
        Ok(PortRange { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl Serialize for PortRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortRange {
    fn deserialize<D>(deserializer: D) -> Result<PortRange, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|e| de::Error::custom(format!("invalid port range '{s}': {e}")))
    }
}

/// Protocol plus optional ports. No ports means every port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMatch {
    pub protocol: Protocol,
    #[serde(default)]
    pub ports: Vec<PortRange>,
}

impl ProtocolMatch {
    pub fn any(protocol: Protocol) -> ProtocolMatch {
        ProtocolMatch {
            protocol,
            ports: vec![],
        }
    }

    pub fn ports(protocol: Protocol, ports: &[u16]) -> ProtocolMatch {
        ProtocolMatch {
            protocol,
            ports: ports.iter().map(|p| PortRange::single(*p)).collect(),
        }
    }

    pub fn matches(&self, protocol: Protocol, port: Option<u16>) -> bool {
        if !self.protocol.matches(protocol) {
            return false;
        }
        if self.ports.is_empty() || !protocol.has_ports() {
            return true;
        }
        match port {
            Some(port) => self.ports.iter().any(|r| r.contains(port)),
            None => false,
        }
    }

    /// Whether some packet could match both matchers.
    pub fn intersects(&self, other: &ProtocolMatch) -> bool {
        let protocols_meet = self.protocol == Protocol::All
            || other.protocol == Protocol::All
            || self.protocol == other.protocol;
        if !protocols_meet {
            return false;
        }
        if self.ports.is_empty() || other.ports.is_empty() {
            return true;
        }
        self.ports
            .iter()
            .any(|a| other.ports.iter().any(|b| a.overlaps(b)))
    }
}

/// A firewall rule of the network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FirewallRule {
    pub label: String,
    pub name: String,
    /// Label of the owning network.
    pub network: String,
    pub description: String,
    pub direction: Direction,
    pub action: RuleAction,
    /// Unset means the provider default of 1000.
    pub priority: Option<u16>,
    pub rules: Vec<ProtocolMatch>,
    #[serde(default)]
    pub source_ranges: Vec<Ipv4>,
    #[serde(default)]
    pub source_tags: Vec<String>,
    #[serde(default)]
    pub destination_ranges: Vec<Ipv4>,
    /// Instances the rule applies to. Empty means every instance.
    #[serde(default)]
    pub target_tags: Vec<String>,
}

impl FirewallRule {
    pub fn address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Firewall, &self.label)
    }

    pub fn network_address(&self) -> ResourceAddress {
        ResourceAddress::new(ResourceKind::Network, &self.network)
    }

    pub fn effective_priority(&self) -> u16 {
        self.priority.unwrap_or(DEFAULT_FIREWALL_PRIORITY)
    }

    pub fn matches_protocol(&self, protocol: Protocol, port: Option<u16>) -> bool {
        self.rules.iter().any(|r| r.matches(protocol, port))
    }

    /// Whether the rule applies to an instance carrying `tags`.
    pub fn targets(&self, tags: &[String]) -> bool {
        self.target_tags.is_empty() || self.target_tags.iter().any(|t| tags.contains(t))
    }

    /// An ingress rule without source ranges or tags applies to `0.0.0.0/0`.
    pub fn has_no_sources(&self) -> bool {
        self.source_ranges.is_empty() && self.source_tags.is_empty()
    }

    /// Whether the rule admits traffic from `source`, by range or by source tag.
    pub fn matches_source(&self, source: Ipv4Addr, source_tags: &[String]) -> bool {
        self.has_no_sources()
            || self.source_ranges.iter().any(|r| r.contains(source))
            || self.source_tags.iter().any(|t| source_tags.contains(t))
    }

    /// Whether every IPv4 address is a matching source, however the ranges are split.
    pub fn admits_any_source(&self) -> bool {
        if self.has_no_sources() {
            return true;
        }
        let mut blocks: Vec<(u64, u64)> = self
            .source_ranges
            .iter()
            .map(|r| (u64::from(u32::from(r.lo())), u64::from(u32::from(r.hi()))))
            .collect();
        blocks.sort();
        let mut next: u64 = 0;
        for (lo, hi) in blocks {
            if lo > next {
                return false;
            }
            next = next.max(hi + 1);
        }
        next > u64::from(u32::MAX)
    }

    pub fn matches_destination(&self, destination: Ipv4Addr) -> bool {
        // egress rules without destination ranges cover 0.0.0.0/0
        self.destination_ranges.is_empty()
            || self.destination_ranges.iter().any(|r| r.contains(destination))
    }

    pub fn matches(&self, packet: &Packet) -> bool {
        if self.direction != packet.direction
            || !self.targets(&packet.instance_tags)
            || !self.matches_protocol(packet.protocol, packet.port)
        {
            return false;
        }
        match self.direction {
            Direction::Ingress => self.matches_source(packet.source, &packet.source_tags),
            Direction::Egress => self.matches_destination(packet.destination),
        }
    }

    /// True when the rule admits `protocol`/`port` from the whole internet.
    pub fn opens_to_world(&self, protocol: Protocol, port: u16) -> bool {
        self.direction == Direction::Ingress
            && self.action == RuleAction::Allow
            && self.admits_any_source()
            && self.matches_protocol(protocol, Some(port))
    }
}

/// A connection attempt, seen from the instance the firewall protects.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub direction: Direction,
    /// A concrete protocol, never [`Protocol::All`].
    pub protocol: Protocol,
    pub port: Option<u16>,
    pub source: Ipv4Addr,
    pub source_tags: Vec<String>,
    pub destination: Ipv4Addr,
    /// Network tags of the protected instance.
    pub instance_tags: Vec<String>,
}

impl Packet {
    /// Inbound packet from `source` to an instance carrying `instance_tags`.
    pub fn ingress(
        protocol: Protocol,
        port: Option<u16>,
        source: Ipv4Addr,
        instance_tags: &[&str],
    ) -> Packet {
        Packet {
            direction: Direction::Ingress,
            protocol,
            port,
            source,
            source_tags: vec![],
            destination: Ipv4Addr::UNSPECIFIED,
            instance_tags: instance_tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}
