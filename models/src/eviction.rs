//! Provides single-Pod evictions through the Kubernetes Eviction API.
//!
//! Evictions, unlike deletions, respect PodDisruptionBudgets (PDBs). A rejected eviction is reported to the caller
//! as a typed [`EvictionError`] so that it can decide whether to continue with the remaining Pods. No retries are
//! attempted here; re-running the equalizer recomputes the plan from live state.
use async_trait::async_trait;
use http::StatusCode;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, EvictParams};
use tracing::{event, instrument, Level};

#[cfg(any(feature = "mockall", test))]
use mockall::{mock, predicate::*};

pub use error::EvictionError;

/// The module-wide result type.
pub type Result<T> = std::result::Result<T, EvictionError>;

/// Identifies one eviction request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvictionRequest {
    pub namespace: String,
    pub pod_name: String,
    /// The Node the Pod was bound to when the plan was built. Used for reporting only.
    pub node_name: String,
    /// Overrides the Pod's termination grace period when set.
    pub grace_period_seconds: Option<u32>,
}

#[async_trait]
/// A trait providing an interface to evict Pods. This is provided as a trait
/// in order to allow mocks to be used for testing purposes.
pub trait EvictionClient: Clone + Sized + Send + Sync {
    /// Requests eviction of a single Pod.
    async fn evict(&self, request: &EvictionRequest) -> Result<()>;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock EvictionClient for use in tests.
    pub EvictionClient {}
    #[async_trait]
    impl EvictionClient for EvictionClient {
        async fn evict(&self, request: &EvictionRequest) -> Result<()>;
    }

    impl Clone for EvictionClient {
        fn clone(&self) -> Self;
    }
}

#[derive(Clone)]
/// Concrete implementation of the `EvictionClient` trait, backed by the Eviction subresource of Pods.
pub struct K8SEvictionClient {
    k8s_client: kube::client::Client,
}

impl K8SEvictionClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SEvictionClient { k8s_client }
    }
}

fn evict_params(grace_period_seconds: Option<u32>) -> EvictParams {
    EvictParams {
        delete_options: grace_period_seconds.map(|grace_period| DeleteParams {
            grace_period_seconds: Some(grace_period),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl EvictionClient for K8SEvictionClient {
    #[instrument(skip(self), fields(pod = %request.pod_name, node = %request.node_name), err)]
    async fn evict(&self, request: &EvictionRequest) -> Result<()> {
        let pod_api: Api<Pod> = Api::namespaced(self.k8s_client.clone(), &request.namespace);

        event!(Level::INFO, "Attempting to evict Pod '{}'", request.pod_name);
        pod_api
            .evict(
                &request.pod_name,
                &evict_params(request.grace_period_seconds),
            )
            .await
            .map_err(|err| EvictionError::from_kube_error(err, &request.pod_name))?;

        event!(
            Level::INFO,
            "Successfully evicted Pod '{}'",
            request.pod_name
        );
        Ok(())
    }
}

pub mod error {
    use super::StatusCode;
    use snafu::Snafu;

    /// Part of the message of the 403 returned when creating objects in a namespace which is being deleted.
    const NAMESPACE_TERMINATING_MESSAGE: &str = "because it is being terminated";

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum EvictionError {
        #[snafu(display(
            "Eviction of Pod '{}' was rejected to respect a PodDisruptionBudget: '{}'",
            pod_name,
            source
        ))]
        /// The API server answered 429 TOO_MANY_REQUESTS.
        DisruptionBudget {
            source: kube::Error,
            pod_name: String,
        },

        #[snafu(display("Pod '{}' no longer exists: '{}'", pod_name, source))]
        NotFound {
            source: kube::Error,
            pod_name: String,
        },

        #[snafu(display("Eviction of Pod '{}' is forbidden: '{}'", pod_name, source))]
        /// The API server refused to authorize the eviction, e.g. because of missing RBAC permissions.
        Forbidden {
            source: kube::Error,
            pod_name: String,
        },

        #[snafu(display(
            "Pod '{}' can not be evicted while its namespace is terminating: '{}'",
            pod_name,
            source
        ))]
        NamespaceTerminating {
            source: kube::Error,
            pod_name: String,
        },

        #[snafu(display("Unable to create eviction for Pod '{}': '{}'", pod_name, source))]
        /// Any other API status, including the 500 returned for misconfigured PodDisruptionBudgets.
        Rejected {
            source: kube::Error,
            pod_name: String,
        },

        #[snafu(display(
            "Credentials were refused while evicting Pod '{}': '{}'",
            pod_name,
            source
        ))]
        Unauthorized {
            source: kube::Error,
            pod_name: String,
        },

        #[snafu(display(
            "Unable to reach the Kubernetes API while evicting Pod '{}': '{}'",
            pod_name,
            source
        ))]
        Transport {
            source: kube::Error,
            pod_name: String,
        },
    }

    impl EvictionError {
        /// Classifies a client error returned by the Eviction API.
        pub fn from_kube_error(source: kube::Error, pod_name: &str) -> Self {
            let pod_name = pod_name.to_string();
            let status_code = match &source {
                kube::Error::Api(response) => Some(StatusCode::from_u16(response.code)),
                _ => None,
            };
            match status_code {
                Some(Ok(StatusCode::TOO_MANY_REQUESTS)) => {
                    Self::DisruptionBudget { source, pod_name }
                }
                Some(Ok(StatusCode::NOT_FOUND)) => Self::NotFound { source, pod_name },
                Some(Ok(StatusCode::FORBIDDEN)) if is_namespace_terminating(&source) => {
                    Self::NamespaceTerminating { source, pod_name }
                }
                Some(Ok(StatusCode::FORBIDDEN)) => Self::Forbidden { source, pod_name },
                Some(Ok(StatusCode::UNAUTHORIZED)) => Self::Unauthorized { source, pod_name },
                Some(_) => Self::Rejected { source, pod_name },
                None => Self::Transport { source, pod_name },
            }
        }

        /// Returns true if the connection to the cluster is unusable or our credentials were refused, so no further
        /// evictions can succeed.
        pub fn is_fatal(&self) -> bool {
            matches!(
                self,
                Self::Forbidden { .. } | Self::Unauthorized { .. } | Self::Transport { .. }
            )
        }

        /// A short, stable label for reports.
        pub fn reason(&self) -> &'static str {
            match self {
                Self::DisruptionBudget { .. } => "DisruptionBudget",
                Self::NotFound { .. } => "NotFound",
                Self::Forbidden { .. } => "Forbidden",
                Self::NamespaceTerminating { .. } => "NamespaceTerminating",
                Self::Rejected { .. } => "Rejected",
                Self::Unauthorized { .. } => "Unauthorized",
                Self::Transport { .. } => "Transport",
            }
        }
    }

    fn is_namespace_terminating(source: &kube::Error) -> bool {
        match source {
            kube::Error::Api(response) => response.message.contains(NAMESPACE_TERMINATING_MESSAGE),
            _ => false,
        }
    }
}
