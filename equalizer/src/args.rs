//! Command line arguments.
use models::constants::DEFAULT_NAMESPACE;

use argh::FromArgs;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(FromArgs, Debug, PartialEq)]
/// Evict pods from overloaded nodes so that workloads are evenly spread.
///
/// Run with --dry-run first to review the eviction plan before applying it.
pub struct Arguments {
    /// namespace to inspect (default: default)
    #[argh(option, default = "DEFAULT_NAMESPACE.to_string()")]
    pub namespace: String,

    /// label selector used to filter pods, e.g. app=my-app
    #[argh(option)]
    pub selector: Option<String>,

    /// label selector to limit which nodes participate in balancing
    #[argh(option)]
    pub node_selector: Option<String>,

    /// explicit path to a kubeconfig; falls back to the default kubeconfig or in-cluster config
    #[argh(option)]
    pub kubeconfig: Option<PathBuf>,

    /// named context inside the kubeconfig
    #[argh(option)]
    pub context: Option<String>,

    /// grace period (seconds) passed to the eviction API
    #[argh(option)]
    pub grace_period: Option<u32>,

    /// upper bound on the number of evictions performed in a single run
    #[argh(option)]
    pub max_evictions: Option<usize>,

    /// plan balancing actions without evicting pods
    #[argh(switch)]
    pub dry_run: bool,

    /// output format: table or json (default: table)
    #[argh(option, default = "OutputFormat::Table")]
    pub output: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}', expected 'table' or 'json'",
                other
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
