//! Reconciliation plan between the declared topology and recorded state.
//!
//! Mirrors what the provisioning engine does on `plan`: every declared
//! resource is compared attribute by attribute with its recorded state and
//! classified as create, in-place update, replace or delete.

use super::graph::DependencyGraph;
use crate::error::Result;
use crate::models::{Ipv4, ResourceAddress, ResourceKind, Topology};
use crate::store::{ResourceState, State};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Placeholder for a value the provider assigns when the change is applied.
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    /// In-place update.
    Update,
    /// Destroy and create again, a force-new attribute changed.
    Replace,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Action::Create => "+",
            Action::Update => "~",
            Action::Replace => "-/+",
            Action::Delete => "-",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub name: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub force_new: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceChange {
    pub address: ResourceAddress,
    pub action: Action,
    /// Empty for creates and deletes.
    pub attributes: Vec<AttributeChange>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PlanSummary {
    pub add: usize,
    pub change: usize,
    pub destroy: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy.",
            self.add, self.change, self.destroy
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Creates, updates and replaces in apply order, then deletes in destroy order.
    pub changes: Vec<ResourceChange>,
    /// Declared state of every resource, recorded by [`apply`].
    desired: BTreeMap<ResourceAddress, ResourceState>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.changes {
            match change.action {
                Action::Create => summary.add += 1,
                Action::Update => summary.change += 1,
                Action::Replace => {
                    summary.add += 1;
                    summary.destroy += 1;
                }
                Action::Delete => summary.destroy += 1,
            }
        }
        summary
    }

    pub fn change_for(&self, address: &ResourceAddress) -> Option<&ResourceChange> {
        self.changes.iter().find(|c| &c.address == address)
    }

    /// Addresses the plan destroys, dependents before what they reference:
    /// deletes first, then replaced resources in reverse apply order.
    pub fn destroy_order(&self) -> Vec<&ResourceAddress> {
        let deletes = self
            .changes
            .iter()
            .filter(|c| c.action == Action::Delete);
        let replaces = self
            .changes
            .iter()
            .rev()
            .filter(|c| c.action == Action::Replace);
        deletes.chain(replaces).map(|c| &c.address).collect()
    }
}

/// Compute the plan converging `state` to `topology`.
pub fn plan(topology: &Topology, state: &State) -> Result<Plan> {
    let graph = DependencyGraph::build(topology)?;
    let mut desired = BTreeMap::new();
    for resource in topology.resources() {
        desired.insert(
            resource.address(),
            ResourceState {
                name: resource.name().to_string(),
                attributes: resource.attributes()?,
                dependencies: resource.references().into_iter().collect(),
            },
        );
    }

    let mut changes = Vec::new();
    let mut replaced: BTreeSet<ResourceAddress> = BTreeSet::new();
    for address in graph.apply_order()? {
        let Some(after) = desired.get(&address) else {
            continue;
        };
        let change = match state.get(&address) {
            None => Some(ResourceChange {
                address: address.clone(),
                action: Action::Create,
                attributes: vec![],
            }),
            Some(before) => {
                let mut change = diff_resource(&address, before, after);
                // apply order puts every dependency ahead, so replacements cascade
                let targets = graph
                    .dependencies_of(&address)
                    .into_iter()
                    .flatten()
                    .filter(|t| replaced.contains(*t));
                for target in targets {
                    if let Some(attribute) = reference_attribute(address.kind, target.kind) {
                        change = Some(follow_replacement(change, &address, before, attribute));
                    }
                }
                change
            }
        };
        if let Some(change) = change {
            log::debug!("{} {}", change.action, change.address);
            if change.action == Action::Replace {
                replaced.insert(address.clone());
            }
            changes.push(change);
        }
    }

    let orphans: BTreeMap<ResourceAddress, BTreeSet<ResourceAddress>> = state
        .resources
        .iter()
        .filter(|(a, _)| !desired.contains_key(a))
        .map(|(a, s)| (a.clone(), s.dependencies.clone()))
        .collect();
    for address in DependencyGraph::from_dependencies(orphans).destroy_order()? {
        log::debug!("{} {}", Action::Delete, address);
        changes.push(ResourceChange {
            address,
            action: Action::Delete,
            attributes: vec![],
        });
    }

    let plan = Plan { changes, desired };
    log::info!("{}", plan.summary());
    Ok(plan)
}

/// Record the outcome of applying `plan` to `state`.
pub fn apply(plan: &Plan, mut state: State) -> State {
    if plan.is_empty() {
        log::info!("No changes. State serial={} unchanged", state.serial);
        return state;
    }
    for change in &plan.changes {
        match change.action {
            Action::Create | Action::Update | Action::Replace => {
                if let Some(desired) = plan.desired.get(&change.address) {
                    state
                        .resources
                        .insert(change.address.clone(), desired.clone());
                }
            }
            Action::Delete => {
                state.resources.remove(&change.address);
            }
        }
    }
    state.serial += 1;
    state.generated_at = Some(chrono::Utc::now());
    log::info!(
        "Applied {} changes, state serial={}",
        plan.changes.len(),
        state.serial
    );
    state
}

fn diff_resource(
    address: &ResourceAddress,
    before: &ResourceState,
    after: &ResourceState,
) -> Option<ResourceChange> {
    let names: BTreeSet<&String> = before
        .attributes
        .keys()
        .chain(after.attributes.keys())
        .collect();

    let attributes: Vec<AttributeChange> = names
        .into_iter()
        .filter_map(|name| {
            let old = before.attributes.get(name);
            let new = after.attributes.get(name);
            if old == new {
                return None;
            }
            Some(AttributeChange {
                name: name.clone(),
                before: old.cloned(),
                after: new.cloned(),
                force_new: is_force_new(address.kind, name, old, new),
            })
        })
        .collect();

    if attributes.is_empty() {
        return None;
    }
    let action = if attributes.iter().any(|a| a.force_new) {
        Action::Replace
    } else {
        Action::Update
    };
    Some(ResourceChange {
        address: address.clone(),
        action,
        attributes,
    })
}

/// Attribute through which a `from` resource refers to a `to` resource.
fn reference_attribute(from: ResourceKind, to: ResourceKind) -> Option<&'static str> {
    match (from, to) {
        (ResourceKind::Subnetwork, ResourceKind::Network)
        | (ResourceKind::Router, ResourceKind::Network)
        | (ResourceKind::Firewall, ResourceKind::Network) => Some("network"),
        (ResourceKind::RouterNat, ResourceKind::Router) => Some("router"),
        (ResourceKind::RouterNat, ResourceKind::Subnetwork) => Some("subnetwork"),
        _ => None,
    }
}

/// Fold the replacement of a referenced resource into the change of `address`.
///
/// The reference gets a new value on apply; a force-new reference turns the
/// change into a replace, any other reference into at least an update.
fn follow_replacement(
    change: Option<ResourceChange>,
    address: &ResourceAddress,
    before: &ResourceState,
    attribute: &str,
) -> ResourceChange {
    let force_new = is_force_new(address.kind, attribute, None, None);
    let mut change = change.unwrap_or_else(|| ResourceChange {
        address: address.clone(),
        action: Action::Update,
        attributes: vec![],
    });
    match change.attributes.iter_mut().find(|a| a.name == attribute) {
        Some(existing) => existing.force_new |= force_new,
        None => change.attributes.push(AttributeChange {
            name: attribute.to_string(),
            before: before.attributes.get(attribute).cloned(),
            after: Some(Value::from(KNOWN_AFTER_APPLY)),
            force_new,
        }),
    }
    if force_new {
        change.action = Action::Replace;
    }
    change
}

/// Whether changing `attribute` forces the resource to be recreated.
pub fn is_force_new(
    kind: ResourceKind,
    attribute: &str,
    before: Option<&Value>,
    after: Option<&Value>,
) -> bool {
    match kind {
        ResourceKind::Network => matches!(
            attribute,
            "name" | "auto_create_subnetworks" | "mtu" | "description"
        ),
        ResourceKind::Subnetwork => match attribute {
            "name" | "network" | "region" => true,
            "ip_cidr_range" => !is_range_expansion(before, after),
            _ => false,
        },
        ResourceKind::Router => matches!(attribute, "name" | "network" | "region"),
        ResourceKind::RouterNat => matches!(attribute, "name" | "router" | "region"),
        ResourceKind::Firewall => matches!(attribute, "name" | "network" | "direction"),
    }
}

/// A primary range may grow in place as long as the new range keeps every old address.
fn is_range_expansion(before: Option<&Value>, after: Option<&Value>) -> bool {
    let parse = |v: Option<&Value>| v.and_then(Value::as_str).and_then(|s| Ipv4::new(s).ok());
    match (parse(before), parse(after)) {
        (Some(old), Some(new)) => new.mask < old.mask && new.contains_block(&old),
        _ => false,
    }
}
