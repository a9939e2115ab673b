//! Builds the ordered list of Pods to evict so that every participating Node converges toward its target.
//!
//! Planning is pure: it reads an [`InventorySnapshot`] and never touches the cluster. Given the same snapshot and
//! settings it always yields the same plan.
use crate::eligibility;
use crate::error::Result;
use crate::load::{LoadTable, NodeLoad, ParticipatingNodeSet, TargetSpread};

use models::inventory::{InventoryPod, InventorySnapshot};

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use tracing::{event, instrument, Level};

/// One Pod selected for eviction, with the load of its Node around the eviction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct EvictionCandidate {
    pub pod: InventoryPod,
    pub node: String,
    /// Occupancy of the Node when the plan was built.
    pub current_load: usize,
    pub target: usize,
    /// Occupancy of the Node just before this eviction, assuming earlier evictions on the Node succeeded.
    pub load_before: usize,
    pub load_after: usize,
}

/// The ordered evictions for a run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Plan {
    candidates: Vec<EvictionCandidate>,
    /// The number of candidates selected before the eviction cap was applied.
    uncapped_len: usize,
}

impl Plan {
    pub fn new(candidates: Vec<EvictionCandidate>) -> Self {
        let uncapped_len = candidates.len();
        Plan {
            candidates,
            uncapped_len,
        }
    }

    /// Keeps at most `cap` candidates. The result is always a prefix of this plan.
    pub fn truncate(mut self, cap: usize) -> Self {
        self.candidates.truncate(cap);
        self
    }

    pub fn candidates(&self) -> &[EvictionCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn uncapped_len(&self) -> usize {
        self.uncapped_len
    }

    pub fn is_capped(&self) -> bool {
        self.candidates.len() < self.uncapped_len
    }

    /// Distinct Nodes touched by the plan, in plan order.
    pub fn affected_nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self.candidates.iter().map(|c| c.node.as_str()).collect();
        nodes.dedup();
        nodes
    }
}

impl IntoIterator for Plan {
    type Item = EvictionCandidate;
    type IntoIter = std::vec::IntoIter<EvictionCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Non-fatal findings surfaced alongside the plan.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PlanWarning {
    /// Pods matching the selector run on Nodes outside the pool. They are left alone.
    OutOfPoolPods { nodes: Vec<String>, pods: usize },
    /// The Node is above target but does not have enough evictable Pods to reach it.
    PartialConvergence {
        node: String,
        surplus: usize,
        evictable: usize,
    },
    /// `--max-evictions` dropped candidates from the end of the plan.
    EvictionCapReached { planned: usize, cap: usize },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::OutOfPoolPods { nodes, pods } => write!(
                f,
                "Found {} pod(s) scheduled on nodes outside the selected pool: {}. They will not be adjusted.",
                pods,
                nodes.join(", ")
            ),
            PlanWarning::PartialConvergence {
                node,
                surplus,
                evictable,
            } => write!(
                f,
                "Node {} is {} pods over target but only {} are safe to evict; {} pod(s) will remain imbalanced.",
                node,
                surplus,
                evictable,
                surplus.saturating_sub(*evictable)
            ),
            PlanWarning::EvictionCapReached { planned, cap } => write!(
                f,
                "Reached --max-evictions limit: {} of {} planned evictions will be issued.",
                cap, planned
            ),
        }
    }
}

/// Everything the planning phase produces for one run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PlanningOutcome {
    /// Every participating Node, by name ascending.
    pub loads: Vec<NodeLoad>,
    pub plan: Plan,
    pub warnings: Vec<PlanWarning>,
}

/// Orders a Node's evictable Pods: lowest priority first, then newest first, then by name.
///
/// A Pod without a creation timestamp is treated as the newest.
pub fn eviction_order(a: &InventoryPod, b: &InventoryPod) -> Ordering {
    let newest_first = match (a.created_at, b.created_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_created), Some(b_created)) => b_created.cmp(&a_created),
    };
    a.priority
        .cmp(&b.priority)
        .then(newest_first)
        .then_with(|| a.name.cmp(&b.name))
}

/// Plans evictions for a snapshot.
#[derive(Clone, Debug, Default)]
pub struct EvictionPlanner {
    /// Used to explain an empty node pool.
    node_selector: String,
    max_evictions: Option<usize>,
}

impl EvictionPlanner {
    pub fn new<S: Into<String>>(node_selector: S, max_evictions: Option<usize>) -> Self {
        EvictionPlanner {
            node_selector: node_selector.into(),
            max_evictions,
        }
    }

    #[instrument(skip(self, snapshot), fields(nodes = snapshot.nodes.len(), pods = snapshot.pods.len()), err)]
    pub fn plan(&self, snapshot: &InventorySnapshot) -> Result<PlanningOutcome> {
        let pool = ParticipatingNodeSet::select(&snapshot.nodes, &self.node_selector)?;
        let table = LoadTable::build(&pool, &snapshot.pods);
        let spread = TargetSpread::compute(&pool, &table);

        let mut warnings = Vec::new();
        if let Some(warning) = out_of_pool_warning(&table) {
            warnings.push(warning);
        }

        let mut loads = Vec::with_capacity(pool.len());
        let mut candidates = Vec::new();
        for (node, pods) in table.iter() {
            let evictable: Vec<&InventoryPod> = pods
                .iter()
                .filter(|pod| match eligibility::ineligibility(pod) {
                    Some(reason) => {
                        event!(
                            Level::DEBUG,
                            pod = %pod.qualified_name(),
                            "Not evicting Pod: {}",
                            reason
                        );
                        false
                    }
                    None => true,
                })
                .collect();
            let load = NodeLoad {
                node: node.clone(),
                occupancy: pods.len(),
                evictable: evictable.len(),
                target: spread.target(node),
            };

            let (node_candidates, warning) = select_surplus(&load, evictable);
            candidates.extend(node_candidates);
            warnings.extend(warning);
            loads.push(load);
        }

        let mut plan = Plan::new(candidates);
        if let Some(cap) = self.max_evictions {
            plan = plan.truncate(cap);
            if plan.is_capped() {
                warnings.push(PlanWarning::EvictionCapReached {
                    planned: plan.uncapped_len(),
                    cap,
                });
            }
        }

        for warning in &warnings {
            event!(Level::WARN, "{}", warning);
        }
        event!(
            Level::INFO,
            planned = plan.len(),
            nodes = plan.affected_nodes().len(),
            "Built eviction plan"
        );

        Ok(PlanningOutcome {
            loads,
            plan,
            warnings,
        })
    }
}

/// Picks the Pods to evict from one Node, emitting a warning if the Node can not reach its target.
fn select_surplus(
    load: &NodeLoad,
    mut evictable: Vec<&InventoryPod>,
) -> (Vec<EvictionCandidate>, Option<PlanWarning>) {
    let surplus = load.surplus();
    if surplus == 0 {
        return (Vec::new(), None);
    }

    evictable.sort_by(|a, b| eviction_order(a, b));

    let warning = (evictable.len() < surplus).then(|| PlanWarning::PartialConvergence {
        node: load.node.clone(),
        surplus,
        evictable: evictable.len(),
    });

    let candidates = evictable
        .into_iter()
        .take(surplus)
        .enumerate()
        .map(|(index, pod)| EvictionCandidate {
            pod: pod.clone(),
            node: load.node.clone(),
            current_load: load.occupancy,
            target: load.target,
            load_before: load.occupancy - index,
            load_after: load.occupancy - index - 1,
        })
        .collect();

    (candidates, warning)
}

fn out_of_pool_warning(table: &LoadTable) -> Option<PlanWarning> {
    let out_of_pool = table.out_of_pool();
    if out_of_pool.is_empty() {
        return None;
    }
    Some(PlanWarning::OutOfPoolPods {
        nodes: out_of_pool.keys().cloned().collect(),
        pods: out_of_pool.values().map(Vec::len).sum(),
    })
}
