use super::{
    error::{self, Result},
    InventoryNode, InventoryPod,
};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams};
use snafu::ResultExt;
use tracing::{event, instrument, Level};

#[cfg(any(feature = "mockall", test))]
use mockall::{mock, predicate::*};

#[async_trait]
/// A trait providing read access to the cluster inventory. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait InventoryClient: Clone + Sized + Send + Sync {
    /// Lists all Nodes matching the label selector. An empty selector matches every Node.
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<InventoryNode>>;
    /// Lists the Pods in `namespace` matching the label selector. An empty selector matches every Pod.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<InventoryPod>>;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock InventoryClient for use in tests.
    pub InventoryClient {}
    #[async_trait]
    impl InventoryClient for InventoryClient {
        async fn list_nodes(&self, label_selector: &str) -> Result<Vec<InventoryNode>>;
        async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<InventoryPod>>;
    }

    impl Clone for InventoryClient {
        fn clone(&self) -> Self;
    }
}

#[derive(Clone)]
/// Concrete implementation of the `InventoryClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SInventoryClient {
    k8s_client: kube::client::Client,
}

impl K8SInventoryClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SInventoryClient { k8s_client }
    }
}

fn list_params(label_selector: &str) -> ListParams {
    if label_selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(label_selector)
    }
}

#[async_trait]
impl InventoryClient for K8SInventoryClient {
    #[instrument(skip(self), err)]
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<InventoryNode>> {
        let nodes: Api<Node> = Api::all(self.k8s_client.clone());
        let node_list = nodes
            .list(&list_params(label_selector))
            .await
            .context(error::ListNodesSnafu {
                selector: label_selector.to_string(),
            })?;

        event!(Level::DEBUG, count = node_list.items.len(), "Listed Nodes");
        Ok(node_list.iter().map(InventoryNode::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<InventoryPod>> {
        let pods: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        let pod_list = pods
            .list(&list_params(label_selector))
            .await
            .context(error::ListPodsSnafu {
                namespace: namespace.to_string(),
                selector: label_selector.to_string(),
            })?;

        event!(Level::DEBUG, count = pod_list.items.len(), "Listed Pods");
        Ok(pod_list.iter().map(InventoryPod::from).collect())
    }
}
