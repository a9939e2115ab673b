/// Name used to identify this tool in logs and in the user agent of cluster requests.
pub const EQUALIZER: &str = "equalizer";

/// Namespace inspected when the operator does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

// Well-known annotation keys
/// Set by the kubelet on the API-server mirror of a static Pod.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";
/// Tri-state opt-in/opt-out for voluntary eviction, shared with the cluster autoscaler.
pub const SAFE_TO_EVICT_ANNOTATION: &str = "cluster-autoscaler.kubernetes.io/safe-to-evict";

// Well-known taint keys
pub const UNREACHABLE_TAINT: &str = "node.kubernetes.io/unreachable";

// Owner reference kinds
pub const DAEMONSET_KIND: &str = "DaemonSet";
/// Mirror Pods are owned by the Node object they run on.
pub const NODE_KIND: &str = "Node";

// Pod phases which may still be acted upon.
pub const POD_PHASE_PENDING: &str = "Pending";
pub const POD_PHASE_RUNNING: &str = "Running";
pub const POD_PHASE_SUCCEEDED: &str = "Succeeded";
pub const POD_PHASE_FAILED: &str = "Failed";
