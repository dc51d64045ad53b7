//! Declaration output for the provisioning engine, in Terraform JSON syntax.
//!
//! References between resources are written as interpolations so the
//! engine derives the same dependency graph [`DependencyGraph`] computes.

use crate::config::{Settings, GOOGLE_PROVIDER_VERSION};
use crate::models::{
    FirewallRule, Nat, Network, Resource, ResourceAddress, ResourceKind, Router, RuleAction,
    Subnet, Topology,
};
use crate::processing::DependencyGraph;
use serde_json::{json, Map, Value};
use std::error::Error;

/// Render the whole declaration.
///
/// Resource blocks are emitted in apply order.
pub fn render(topology: &Topology, settings: &Settings) -> Result<Value, Box<dyn Error>> {
    let graph = DependencyGraph::build(topology)?;
    let mut resources: Map<String, Value> = Map::new();
    for address in graph.apply_order()? {
        let resource = topology
            .resource(&address)
            .ok_or_else(|| format!("Resource {address} missing from topology"))?;
        let block = match resource {
            Resource::Network(n) => network_block(n),
            Resource::Subnetwork(s) => subnet_block(s, settings),
            Resource::Router(r) => router_block(r, settings),
            Resource::RouterNat(n) => nat_block(n, settings),
            Resource::Firewall(f) => firewall_block(f),
        };
        let by_type = resources
            .entry(address.kind.type_name())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(by_label) = by_type {
            by_label.insert(address.label.clone(), block);
        }
    }
    log::info!(
        "Rendered {} resources in {} waves",
        graph.len(),
        graph.waves()?.len()
    );

    Ok(json!({
        "terraform": {
            "required_providers": {
                "google": {
                    "source": "hashicorp/google",
                    "version": GOOGLE_PROVIDER_VERSION,
                }
            }
        },
        "provider": {
            "google": {
                "project": "${var.project_id}",
                "region": "${var.region}",
            }
        },
        "variable": {
            "project_id": {
                "type": "string",
                "description": "Project the network is created in",
                "default": settings.project_id,
            },
            "region": {
                "type": "string",
                "description": "Region of the subnets, router and NAT gateway",
                "default": settings.region,
            },
        },
        "resource": resources,
        "output": outputs(topology),
    }))
}

/// Render and write the declaration to `path` as pretty JSON.
pub fn write_declaration(
    path: &str,
    topology: &Topology,
    settings: &Settings,
) -> Result<(), Box<dyn Error>> {
    let declaration = render(topology, settings)?;
    let json = serde_json::to_string_pretty(&declaration)
        .map_err(|e| format!("Error serializing declaration: {e}"))?;
    std::fs::write(path, json + "\n")
        .map_err(|e| format!("Error writing declaration {path}: {e}"))?;
    log::info!("Wrote declaration to {path}");
    Ok(())
}

fn region(region: &str, settings: &Settings) -> Value {
    if region == settings.region {
        json!("${var.region}")
    } else {
        json!(region)
    }
}

fn network_block(network: &Network) -> Value {
    json!({
        "name": network.name,
        "description": network.description,
        "auto_create_subnetworks": network.auto_create_subnetworks,
        "mtu": network.mtu,
        "routing_mode": network.routing_mode,
    })
}

fn subnet_block(subnet: &Subnet, settings: &Settings) -> Value {
    let mut block = json!({
        "name": subnet.name,
        "network": subnet.network_address().interpolate("id"),
        "ip_cidr_range": subnet.ip_cidr_range,
        "region": region(&subnet.region, settings),
        "private_ip_google_access": subnet.private_ip_google_access,
    });
    if !subnet.secondary_ip_range.is_empty() {
        block["secondary_ip_range"] = json!(subnet.secondary_ip_range);
    }
    if let Some(log_config) = &subnet.log_config {
        block["log_config"] = json!(log_config);
    }
    block
}

fn router_block(router: &Router, settings: &Settings) -> Value {
    let mut block = json!({
        "name": router.name,
        "network": router.network_address().interpolate("id"),
        "region": region(&router.region, settings),
    });
    if let Some(bgp) = &router.bgp {
        block["bgp"] = json!(bgp);
    }
    block
}

fn nat_block(nat: &Nat, settings: &Settings) -> Value {
    let subnetworks: Vec<Value> = nat
        .subnetwork
        .iter()
        .map(|s| {
            json!({
                "name": ResourceAddress::new(ResourceKind::Subnetwork, &s.name).interpolate("id"),
                "source_ip_ranges_to_nat": s.source_ip_ranges_to_nat,
            })
        })
        .collect();
    let mut block = json!({
        "name": nat.name,
        "router": nat.router_address().interpolate("name"),
        "region": region(&nat.region, settings),
        "nat_ip_allocate_option": nat.nat_ip_allocate_option,
        "source_subnetwork_ip_ranges_to_nat": nat.source_subnetwork_ip_ranges_to_nat,
        "subnetwork": subnetworks,
    });
    if let Some(log_config) = &nat.log_config {
        block["log_config"] = json!(log_config);
    }
    if !nat.depends_on.is_empty() {
        let depends_on: Vec<String> = nat.depends_on.iter().map(|a| a.to_string()).collect();
        block["depends_on"] = json!(depends_on);
    }
    block
}

fn firewall_block(rule: &FirewallRule) -> Value {
    let matchers: Vec<Value> = rule
        .rules
        .iter()
        .map(|m| {
            let mut matcher = json!({ "protocol": m.protocol });
            if !m.ports.is_empty() {
                matcher["ports"] = json!(m.ports);
            }
            matcher
        })
        .collect();
    let action = match rule.action {
        RuleAction::Allow => "allow",
        RuleAction::Deny => "deny",
    };

    let mut block = json!({
        "name": rule.name,
        "network": rule.network_address().interpolate("name"),
        "description": rule.description,
        "direction": rule.direction,
    });
    block[action] = json!(matchers);
    if let Some(priority) = rule.priority {
        block["priority"] = json!(priority);
    }
    for (key, values) in [
        ("source_ranges", json!(rule.source_ranges)),
        ("source_tags", json!(rule.source_tags)),
        ("destination_ranges", json!(rule.destination_ranges)),
        ("target_tags", json!(rule.target_tags)),
    ] {
        if values.as_array().is_some_and(|a| !a.is_empty()) {
            block[key] = values;
        }
    }
    block
}

fn outputs(topology: &Topology) -> Value {
    let network = topology.network.address();
    let mut outputs = Map::new();
    outputs.insert(
        "network_id".to_string(),
        json!({ "value": network.interpolate("id") }),
    );
    outputs.insert(
        "network_name".to_string(),
        json!({ "value": network.interpolate("name") }),
    );
    for subnet in &topology.subnets {
        outputs.insert(
            format!("{}_subnet_id", subnet.label),
            json!({ "value": subnet.address().interpolate("id") }),
        );
    }
    outputs.insert(
        "nat_name".to_string(),
        json!({ "value": topology.nat.address().interpolate("name") }),
    );
    Value::Object(outputs)
}
