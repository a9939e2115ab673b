//! An immutable view of the Nodes and Pods the equalizer reasons about.
//!
//! Values are converted from `k8s-openapi` objects once per run. Only the attributes used for pool selection,
//! eligibility and ordering are retained.
mod client;
mod error;

pub use self::client::*;
pub use self::error::Error as InventoryError;

use crate::constants;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use serde::Serialize;

use std::collections::BTreeMap;
use std::fmt;

/// A Node as seen at the start of a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InventoryNode {
    pub name: String,
    /// False for cordoned Nodes and Nodes the control plane considers unreachable.
    pub schedulable: bool,
    pub labels: BTreeMap<String, String>,
}

impl From<&Node> for InventoryNode {
    fn from(node: &Node) -> Self {
        let spec = node.spec.as_ref();
        let cordoned = spec.and_then(|s| s.unschedulable).unwrap_or(false);
        let unreachable = spec
            .and_then(|s| s.taints.as_ref())
            .map(|taints| {
                taints
                    .iter()
                    .any(|taint| taint.key == constants::UNREACHABLE_TAINT)
            })
            .unwrap_or(false);

        InventoryNode {
            name: node.name_any(),
            schedulable: !cordoned && !unreachable,
            labels: node.labels().clone(),
        }
    }
}

/// The kind of object controlling a Pod, as far as eviction is concerned.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "name")]
pub enum PodOwner {
    DaemonSet,
    /// Mirror Pods of static Pods are owned by their Node.
    Node,
    Other(String),
}

impl PodOwner {
    /// A DaemonSet among any of the owner references wins. Otherwise picks the controlling owner reference, falling
    /// back to the first reference when none is marked as controller.
    fn from_references(references: &[OwnerReference]) -> Option<Self> {
        if references
            .iter()
            .any(|reference| reference.kind == constants::DAEMONSET_KIND)
        {
            return Some(PodOwner::DaemonSet);
        }
        references
            .iter()
            .find(|reference| reference.controller == Some(true))
            .or_else(|| references.first())
            .map(|reference| match reference.kind.as_str() {
                constants::DAEMONSET_KIND => PodOwner::DaemonSet,
                constants::NODE_KIND => PodOwner::Node,
                other => PodOwner::Other(other.to_string()),
            })
    }
}

/// The resolved value of the safe-to-evict annotation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Default)]
pub enum SafeToEvict {
    /// The annotation is present and set to `true`.
    Allowed,
    /// The annotation is present and set to `false`. The Pod is never evicted.
    Forbidden,
    /// The annotation is absent or holds an unrecognized value. Eviction is allowed.
    #[default]
    Unset,
}

impl SafeToEvict {
    pub fn from_annotation(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("true") => SafeToEvict::Allowed,
            Some("false") => SafeToEvict::Forbidden,
            _ => SafeToEvict::Unset,
        }
    }

    pub fn permits_eviction(&self) -> bool {
        !matches!(self, SafeToEvict::Forbidden)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Default)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some(constants::POD_PHASE_PENDING) => PodPhase::Pending,
            Some(constants::POD_PHASE_RUNNING) => PodPhase::Running,
            Some(constants::POD_PHASE_SUCCEEDED) => PodPhase::Succeeded,
            Some(constants::POD_PHASE_FAILED) => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }

    /// Only Pods which have not yet run to completion can be meaningfully evicted.
    pub fn is_active(&self) -> bool {
        matches!(self, PodPhase::Pending | PodPhase::Running)
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A Pod as seen at the start of a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct InventoryPod {
    pub namespace: String,
    pub name: String,
    /// `None` until the scheduler has bound the Pod.
    pub node_name: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub owner: Option<PodOwner>,
    /// Whether the Pod carries the kubelet's mirror annotation.
    pub mirror: bool,
    pub safe_to_evict: SafeToEvict,
    /// Pods without an explicit priority are treated as priority 0.
    pub priority: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub phase: PodPhase,
}

impl InventoryPod {
    /// Returns the `namespace/name` form used in logs and reports.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror || self.owner == Some(PodOwner::Node)
    }

    pub fn is_daemonset_member(&self) -> bool {
        self.owner == Some(PodOwner::DaemonSet)
    }
}

impl From<&Pod> for InventoryPod {
    fn from(pod: &Pod) -> Self {
        let annotations = pod.annotations();
        let spec = pod.spec.as_ref();

        InventoryPod {
            namespace: pod.namespace().unwrap_or_default(),
            name: pod.name_any(),
            node_name: spec
                .and_then(|s| s.node_name.clone())
                .filter(|name| !name.is_empty()),
            labels: pod.labels().clone(),
            owner: PodOwner::from_references(pod.owner_references()),
            mirror: annotations.contains_key(constants::MIRROR_POD_ANNOTATION),
            safe_to_evict: SafeToEvict::from_annotation(
                annotations
                    .get(constants::SAFE_TO_EVICT_ANNOTATION)
                    .map(String::as_str),
            ),
            priority: spec.and_then(|s| s.priority).unwrap_or(0),
            created_at: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
            phase: PodPhase::from_status(
                pod.status.as_ref().and_then(|s| s.phase.as_deref()),
            ),
        }
    }
}

/// Everything fetched from the cluster for one run.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct InventorySnapshot {
    pub nodes: Vec<InventoryNode>,
    pub pods: Vec<InventoryPod>,
}

impl InventorySnapshot {
    pub fn new(nodes: Vec<InventoryNode>, pods: Vec<InventoryPod>) -> Self {
        InventorySnapshot { nodes, pods }
    }

    /// Fetches nodes matching `node_selector` and pods matching `pod_selector` within `namespace`.
    pub async fn fetch<T: InventoryClient>(
        client: &T,
        namespace: &str,
        pod_selector: &str,
        node_selector: &str,
    ) -> error::Result<Self> {
        let nodes = client.list_nodes(node_selector).await?;
        let pods = client.list_pods(namespace, pod_selector).await?;
        Ok(InventorySnapshot::new(nodes, pods))
    }
}
