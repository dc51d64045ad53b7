//! Dependency graph of the declared resources.
//!
//! Nodes are resources, edges are references (attribute references plus
//! explicit `depends_on`). A resource is applied only after everything it
//! references.

use crate::error::{Result, TopologyError};
use crate::models::{ResourceAddress, Topology};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// address -> addresses it depends on
    dependencies: BTreeMap<ResourceAddress, BTreeSet<ResourceAddress>>,
}

impl DependencyGraph {
    /// Build the graph, failing on duplicate addresses or unresolved references.
    pub fn build(topology: &Topology) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::default();
        for resource in topology.resources() {
            let address = resource.address();
            if graph.dependencies.contains_key(&address) {
                return Err(TopologyError::DuplicateResource(address));
            }
            graph
                .dependencies
                .insert(address, resource.references().into_iter().collect());
        }

        for (from, deps) in &graph.dependencies {
            if let Some(missing) = deps.iter().find(|d| !graph.dependencies.contains_key(d)) {
                return Err(TopologyError::UnresolvedReference {
                    from: from.clone(),
                    to: missing.clone(),
                });
            }
        }
        log::debug!(
            "dependency graph: {} nodes, {} edges",
            graph.dependencies.len(),
            graph.edge_count()
        );
        Ok(graph)
    }

    /// Graph over recorded dependencies, e.g. those kept in a state file.
    /// Dependencies on addresses outside the map are ignored.
    pub fn from_dependencies(
        dependencies: BTreeMap<ResourceAddress, BTreeSet<ResourceAddress>>,
    ) -> DependencyGraph {
        let known: BTreeSet<ResourceAddress> = dependencies.keys().cloned().collect();
        let dependencies = dependencies
            .into_iter()
            .map(|(a, deps)| (a, deps.intersection(&known).cloned().collect()))
            .collect();
        DependencyGraph { dependencies }
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(|d| d.len()).sum()
    }

    pub fn dependencies_of(&self, address: &ResourceAddress) -> Option<&BTreeSet<ResourceAddress>> {
        self.dependencies.get(address)
    }

    /// Groups of resources in apply order. Members of one wave have no edge
    /// between them and may be applied concurrently.
    pub fn waves(&self) -> Result<Vec<Vec<ResourceAddress>>> {
        let mut remaining: BTreeMap<&ResourceAddress, BTreeSet<&ResourceAddress>> = self
            .dependencies
            .iter()
            .map(|(a, deps)| (a, deps.iter().collect()))
            .collect();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<&ResourceAddress> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(a, _)| *a)
                .collect();
            if ready.is_empty() {
                let mut cycle: Vec<ResourceAddress> =
                    remaining.keys().map(|a| (*a).clone()).collect();
                cycle.sort();
                return Err(TopologyError::DependencyCycle(cycle));
            }
            for address in &ready {
                remaining.remove(address);
            }
            for deps in remaining.values_mut() {
                for address in &ready {
                    deps.remove(address);
                }
            }
            waves.push(ready.into_iter().cloned().collect());
        }
        Ok(waves)
    }

    /// Topological order, deterministic by address inside each wave.
    pub fn apply_order(&self) -> Result<Vec<ResourceAddress>> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }

    /// Reverse of the apply order: dependents are removed before what they reference.
    pub fn destroy_order(&self) -> Result<Vec<ResourceAddress>> {
        let mut order = self.apply_order()?;
        order.reverse();
        Ok(order)
    }
}
