//! Decides whether a Pod may ever be chosen for eviction.
//!
//! Ineligible Pods still count toward the occupancy of their Node. They are only left out of the pool from which
//! surplus Pods are picked.
use models::inventory::{InventoryPod, PodPhase};

use serde::Serialize;
use std::fmt;

/// The reason a Pod is never evicted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Ineligibility {
    /// Static Pods are managed by the kubelet and come straight back.
    MirrorPod,
    /// The DaemonSet controller would recreate the Pod on the same Node.
    DaemonSetMember,
    /// The safe-to-evict annotation is set to `false`.
    EvictionForbidden,
    /// The Pod has already finished or its state is unknown.
    InactivePhase(PodPhase),
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::MirrorPod => write!(f, "Pod is a static Mirror Pod"),
            Ineligibility::DaemonSetMember => write!(f, "Pod is member of a DaemonSet"),
            Ineligibility::EvictionForbidden => write!(f, "Pod is annotated as unsafe to evict"),
            Ineligibility::InactivePhase(phase) => write!(f, "Pod is in phase '{}'", phase),
        }
    }
}

/// Returns the first reason the Pod can not be evicted, if any.
pub fn ineligibility(pod: &InventoryPod) -> Option<Ineligibility> {
    if pod.is_mirror() {
        Some(Ineligibility::MirrorPod)
    } else if pod.is_daemonset_member() {
        Some(Ineligibility::DaemonSetMember)
    } else if !pod.safe_to_evict.permits_eviction() {
        Some(Ineligibility::EvictionForbidden)
    } else if !pod.phase.is_active() {
        Some(Ineligibility::InactivePhase(pod.phase))
    } else {
        None
    }
}

pub fn is_evictable(pod: &InventoryPod) -> bool {
    ineligibility(pod).is_none()
}
