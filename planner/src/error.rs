use crate::executor::ExecutionReport;

use models::eviction::EvictionError;

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "No schedulable nodes match the node selector '{}'. Adjust --node-selector or uncordon nodes.",
        node_selector
    ))]
    NoMatchingNodes { node_selector: String },

    #[snafu(display(
        "Aborting after {} of {} planned evictions were attempted, {} succeeded: '{}'",
        attempted,
        planned,
        succeeded,
        source
    ))]
    /// The cluster became unusable during execution. `report` holds every candidate processed so far, including
    /// the one whose failure ended the run.
    ConnectionLost {
        source: EvictionError,
        attempted: usize,
        succeeded: usize,
        planned: usize,
        report: Box<ExecutionReport>,
    },
}

impl Error {
    /// The outcomes recorded before execution was aborted, if any.
    pub fn partial_report(&self) -> Option<&ExecutionReport> {
        match self {
            Error::ConnectionLost { report, .. } => Some(report),
            _ => None,
        }
    }
}
