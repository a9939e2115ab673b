//! Walks a [`Plan`] in order and issues one eviction at a time.
//!
//! A candidate moves from `Planned` to `DryRunSkipped`, or through `Requested` to `Succeeded` or `Failed`. A failed
//! eviction is recorded and the next candidate is attempted. Only failures which show that the cluster can no
//! longer be reached or that our credentials were refused end the run early.
use crate::error::{self, Result};
use crate::plan::{EvictionCandidate, Plan};

use models::eviction::{EvictionClient, EvictionRequest};

use serde::Serialize;
use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// The lifecycle of one eviction candidate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "state")]
pub enum CandidateState {
    Planned,
    DryRunSkipped,
    Requested,
    Succeeded,
    Failed { reason: String, message: String },
}

impl CandidateState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CandidateState::Planned | CandidateState::Requested)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CandidateOutcome {
    pub candidate: EvictionCandidate,
    pub state: CandidateState,
}

/// The result of executing a plan.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub dry_run: bool,
    pub outcomes: Vec<CandidateOutcome>,
}

impl ExecutionReport {
    fn count(&self, predicate: impl Fn(&CandidateState) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.state))
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|state| *state == CandidateState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(|state| matches!(state, CandidateState::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|state| *state == CandidateState::DryRunSkipped)
    }

    pub fn attempted(&self) -> usize {
        self.succeeded() + self.failed()
    }
}

/// Issues the evictions of a plan through an [`EvictionClient`].
#[derive(Clone)]
pub struct Executor<T: EvictionClient> {
    client: T,
    grace_period_seconds: Option<u32>,
    dry_run: bool,
}

impl<T: EvictionClient> Executor<T> {
    pub fn new(client: T, grace_period_seconds: Option<u32>, dry_run: bool) -> Self {
        Executor {
            client,
            grace_period_seconds,
            dry_run,
        }
    }

    /// Executes every candidate of the plan sequentially, in plan order.
    #[instrument(skip(self, plan), fields(planned = plan.len(), dry_run = self.dry_run), err)]
    pub async fn execute(&self, plan: Plan) -> Result<ExecutionReport> {
        let planned = plan.len();
        let mut report = ExecutionReport {
            dry_run: self.dry_run,
            outcomes: Vec::with_capacity(planned),
        };

        for candidate in plan {
            match self.process(&candidate).await {
                Ok(state) => report.outcomes.push(CandidateOutcome { candidate, state }),
                Err(err) => {
                    report.outcomes.push(CandidateOutcome {
                        candidate,
                        state: CandidateState::Failed {
                            reason: err.reason().to_string(),
                            message: err.to_string(),
                        },
                    });
                    let (attempted, succeeded) = (report.attempted(), report.succeeded());
                    return Err(err).context(error::ConnectionLostSnafu {
                        attempted,
                        succeeded,
                        planned,
                        report: Box::new(report),
                    });
                }
            }
        }

        event!(
            Level::INFO,
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Finished executing eviction plan"
        );
        Ok(report)
    }

    /// Drives one candidate to a terminal state. Returns an error only if the failure is fatal to the run.
    async fn process(
        &self,
        candidate: &EvictionCandidate,
    ) -> std::result::Result<CandidateState, models::eviction::EvictionError> {
        let pod_name = candidate.pod.qualified_name();
        if self.dry_run {
            event!(Level::INFO, pod = %pod_name, "Dry run: not evicting Pod");
            return Ok(CandidateState::DryRunSkipped);
        }

        let request = EvictionRequest {
            namespace: candidate.pod.namespace.clone(),
            pod_name: candidate.pod.name.clone(),
            node_name: candidate.node.clone(),
            grace_period_seconds: self.grace_period_seconds,
        };
        event!(
            Level::DEBUG,
            pod = %pod_name,
            node = %candidate.node,
            state = ?CandidateState::Requested,
            "Requesting eviction"
        );

        match self.client.evict(&request).await {
            Ok(()) => Ok(CandidateState::Succeeded),
            Err(err) if err.is_fatal() => {
                event!(Level::ERROR, pod = %pod_name, "Aborting evictions: '{}'", err);
                Err(err)
            }
            Err(err) => {
                event!(Level::ERROR, pod = %pod_name, "Failed to evict Pod: '{}'", err);
                Ok(CandidateState::Failed {
                    reason: err.reason().to_string(),
                    message: err.to_string(),
                })
            }
        }
    }
}
