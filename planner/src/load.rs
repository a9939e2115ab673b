//! Groups Pods by the Node they occupy and computes an even target count for every participating Node.
use crate::error::{self, Result};

use models::inventory::{InventoryNode, InventoryPod};

use serde::Serialize;
use snafu::ensure;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{event, Level};

/// The schedulable Nodes selected for balancing, ordered by name. Never empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParticipatingNodeSet {
    names: BTreeSet<String>,
}

impl ParticipatingNodeSet {
    /// Keeps the schedulable Nodes. `node_selector` is only used to describe an empty result.
    pub fn select(nodes: &[InventoryNode], node_selector: &str) -> Result<Self> {
        let names: BTreeSet<String> = nodes
            .iter()
            .filter(|node| {
                if !node.schedulable {
                    event!(
                        Level::DEBUG,
                        node = %node.name,
                        "Excluding Node from the pool: Node is not schedulable"
                    );
                }
                node.schedulable
            })
            .map(|node| node.name.clone())
            .collect();

        ensure!(
            !names.is_empty(),
            error::NoMatchingNodesSnafu {
                node_selector: node_selector.to_string(),
            }
        );
        Ok(ParticipatingNodeSet { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, node_name: &str) -> bool {
        self.names.contains(node_name)
    }

    /// Iterates over Node names in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }
}

/// Pods bound to each participating Node, in the order they were listed.
///
/// Pods bound to Nodes outside of the pool are kept aside and never planned. Unbound Pods are dropped.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadTable {
    by_node: BTreeMap<String, Vec<InventoryPod>>,
    out_of_pool: BTreeMap<String, Vec<InventoryPod>>,
}

impl LoadTable {
    pub fn build(pool: &ParticipatingNodeSet, pods: &[InventoryPod]) -> Self {
        let mut by_node: BTreeMap<String, Vec<InventoryPod>> = pool
            .iter()
            .map(|name| (name.clone(), Vec::new()))
            .collect();
        let mut out_of_pool: BTreeMap<String, Vec<InventoryPod>> = BTreeMap::new();

        for pod in pods {
            let node_name = match pod.node_name.as_ref() {
                Some(node_name) => node_name,
                None => {
                    event!(
                        Level::DEBUG,
                        pod = %pod.qualified_name(),
                        "Ignoring Pod which is not bound to a Node"
                    );
                    continue;
                }
            };
            match by_node.get_mut(node_name) {
                Some(node_pods) => node_pods.push(pod.clone()),
                None => out_of_pool
                    .entry(node_name.clone())
                    .or_default()
                    .push(pod.clone()),
            }
        }

        LoadTable {
            by_node,
            out_of_pool,
        }
    }

    /// The Pods bound to a participating Node.
    pub fn pods(&self, node_name: &str) -> &[InventoryPod] {
        self.by_node
            .get(node_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn occupancy(&self, node_name: &str) -> usize {
        self.pods(node_name).len()
    }

    /// The number of Pods bound to participating Nodes.
    pub fn total(&self) -> usize {
        self.by_node.values().map(Vec::len).sum()
    }

    /// Iterates over participating Nodes and their Pods, by Node name ascending.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<InventoryPod>)> {
        self.by_node.iter()
    }

    /// Pods bound to Nodes outside of the pool, keyed by Node name.
    pub fn out_of_pool(&self) -> &BTreeMap<String, Vec<InventoryPod>> {
        &self.out_of_pool
    }
}

/// The even target occupancy of every participating Node.
///
/// Each Node gets `total / n`; the first `total % n` Nodes by name receive one extra Pod, so the targets sum to
/// `total` and differ by at most one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetSpread {
    targets: BTreeMap<String, usize>,
}

impl TargetSpread {
    pub fn compute(pool: &ParticipatingNodeSet, table: &LoadTable) -> Self {
        let total = table.total();
        let base = total / pool.len();
        let remainder = total % pool.len();

        let targets = pool
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let target = if index < remainder { base + 1 } else { base };
                (name.clone(), target)
            })
            .collect();

        event!(
            Level::DEBUG,
            total,
            nodes = pool.len(),
            base,
            remainder,
            "Computed target spread"
        );
        TargetSpread { targets }
    }

    pub fn target(&self, node_name: &str) -> usize {
        self.targets.get(node_name).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &usize)> {
        self.targets.iter()
    }
}

/// Occupancy and target of one participating Node, as shown in reports.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NodeLoad {
    pub node: String,
    pub occupancy: usize,
    /// Pods on the Node which may be evicted.
    pub evictable: usize,
    pub target: usize,
}

impl NodeLoad {
    pub fn surplus(&self) -> usize {
        self.occupancy.saturating_sub(self.target)
    }
}
