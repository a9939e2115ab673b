//! Inventory fixtures shared by the planner tests.
use chrono::{DateTime, TimeZone, Utc};
use models::inventory::{InventoryNode, InventoryPod, PodPhase, SafeToEvict};

pub(crate) fn timestamp(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

pub(crate) fn fake_node(name: &str) -> InventoryNode {
    InventoryNode {
        name: name.to_string(),
        schedulable: true,
        labels: Default::default(),
    }
}

pub(crate) fn fake_pod(name: &str, node_name: &str) -> InventoryPod {
    InventoryPod {
        namespace: "default".to_string(),
        name: name.to_string(),
        node_name: Some(node_name.to_string()),
        labels: Default::default(),
        owner: None,
        mirror: false,
        safe_to_evict: SafeToEvict::Unset,
        priority: 0,
        created_at: Some(timestamp(0)),
        phase: PodPhase::Running,
    }
}

/// Builds `count` Pods named `{prefix}-{i}` on the given Node, each one second younger than the last.
pub(crate) fn fake_pods(prefix: &str, node_name: &str, count: usize) -> Vec<InventoryPod> {
    (0..count)
        .map(|i| {
            let mut pod = fake_pod(&format!("{}-{}", prefix, i), node_name);
            pod.created_at = Some(timestamp(i as i64));
            pod
        })
        .collect()
}
