//! Computes and executes plans that spread a set of Pods evenly across a pool of Nodes.
//!
//! The planner never places Pods. It only selects surplus Pods on overloaded Nodes for eviction and relies on the
//! cluster's scheduler to place their replacements.
pub mod eligibility;
pub mod error;
pub mod executor;
pub mod load;
pub mod plan;

pub use crate::error::{Error, Result};
pub use crate::executor::{CandidateOutcome, CandidateState, ExecutionReport, Executor};
pub use crate::plan::{EvictionCandidate, EvictionPlanner, Plan, PlanWarning, PlanningOutcome};

#[cfg(test)]
pub(crate) mod fixtures;
