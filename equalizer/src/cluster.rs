//! Builds the Kubernetes client handle shared by inventory access and evictions.
use crate::error::{self, Result};

use kube::config::{KubeConfigOptions, Kubeconfig};
use snafu::ResultExt;
use std::path::Path;
use tracing::{event, instrument, Level};

/// Creates a client from an explicit kubeconfig and/or context.
///
/// Without either, the configuration is inferred: the default kubeconfig first, then the in-cluster service account.
#[instrument(err)]
pub async fn create_client(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let config = match (kubeconfig, context) {
        (None, None) => kube::Config::infer()
            .await
            .context(error::InferConfigSnafu)?,
        (Some(path), _) => {
            let kubeconfig = Kubeconfig::read_from(path).context(error::KubeconfigSnafu)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .context(error::KubeconfigSnafu)?
        }
        (None, Some(_)) => kube::Config::from_kubeconfig(&options)
            .await
            .context(error::KubeconfigSnafu)?,
    };

    event!(
        Level::DEBUG,
        cluster_url = %config.cluster_url,
        "Loaded cluster configuration"
    );
    kube::Client::try_from(config).context(error::ClientCreateSnafu)
}
