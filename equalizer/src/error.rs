use models::{inventory::InventoryError, telemetry::TelemetryConfigError};

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to infer Kubernetes client config: '{}'", source))]
    InferConfig {
        source: kube::config::InferConfigError,
    },

    #[snafu(display("Unable to load kubeconfig: '{}'", source))]
    Kubeconfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Unable to create Kubernetes client: '{}'", source))]
    ClientCreate { source: kube::Error },

    #[snafu(display("Unable to fetch cluster inventory: '{}'", source))]
    FetchInventory { source: InventoryError },

    #[snafu(display("{}", source))]
    Planning { source: planner::Error },

    #[snafu(display("{}", source))]
    Execution { source: planner::Error },

    #[snafu(display("Unable to serialize run report: '{}'", source))]
    SerializeReport { source: serde_json::Error },

    #[snafu(display("Unable to write output: '{}'", source))]
    WriteOutput { source: std::io::Error },

    #[snafu(display("Error configuring telemetry: '{}'", source))]
    TelemetryInit { source: TelemetryConfigError },
}
