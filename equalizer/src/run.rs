//! One equalizer run: fetch the inventory, plan, report the plan, execute it and report the results.
use crate::args::{Arguments, OutputFormat};
use crate::error::{self, Result};
use crate::render::{self, RunReport};

use chrono::Utc;
use models::eviction::EvictionClient;
use models::inventory::{InventoryClient, InventorySnapshot};
use planner::{EvictionPlanner, Executor, PlanningOutcome};

use snafu::ResultExt;
use std::io::Write;
use tracing::{event, instrument, Level};

/// Exit code for a completed run, including runs in which some evictions were rejected.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for runs that could not plan or lost the cluster connection.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for runs which found nothing to evict.
pub const EXIT_NOTHING_TO_BALANCE: i32 = 2;

/// The semantic parameters of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSettings {
    pub namespace: String,
    /// An empty selector matches every Pod in the namespace.
    pub pod_selector: String,
    /// An empty selector matches every schedulable Node.
    pub node_selector: String,
    pub grace_period_seconds: Option<u32>,
    pub max_evictions: Option<usize>,
    pub dry_run: bool,
    pub output: OutputFormat,
}

impl From<&Arguments> for RunSettings {
    fn from(args: &Arguments) -> Self {
        RunSettings {
            namespace: args.namespace.clone(),
            pod_selector: args.selector.clone().unwrap_or_default(),
            node_selector: args.node_selector.clone().unwrap_or_default(),
            grace_period_seconds: args.grace_period,
            max_evictions: args.max_evictions,
            dry_run: args.dry_run,
            output: args.output,
        }
    }
}

/// How a run ended, when it did not fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// The plan was empty.
    NothingToBalance,
    DryRun { planned: usize },
    Executed { succeeded: usize, failed: usize },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NothingToBalance => EXIT_NOTHING_TO_BALANCE,
            RunOutcome::DryRun { .. } | RunOutcome::Executed { .. } => EXIT_SUCCESS,
        }
    }
}

/// Performs a run, writing the plan and report to `out`.
#[instrument(skip(inventory, evictor, out), err)]
pub async fn run<I, E, W>(
    settings: &RunSettings,
    inventory: &I,
    evictor: E,
    out: &mut W,
) -> Result<RunOutcome>
where
    I: InventoryClient,
    E: EvictionClient,
    W: Write,
{
    let snapshot = InventorySnapshot::fetch(
        inventory,
        &settings.namespace,
        &settings.pod_selector,
        &settings.node_selector,
    )
    .await
    .context(error::FetchInventorySnafu)?;

    let PlanningOutcome {
        loads,
        plan,
        warnings,
    } = EvictionPlanner::new(settings.node_selector.clone(), settings.max_evictions)
        .plan(&snapshot)
        .context(error::PlanningSnafu)?;

    if settings.output == OutputFormat::Table {
        write_output(out, &render::render_plan(&loads, &plan, &warnings, Utc::now()))?;
    }

    if plan.is_empty() && !plan.is_capped() {
        event!(Level::INFO, "Nothing to balance");
        if settings.output == OutputFormat::Json {
            let report = RunReport {
                namespace: &settings.namespace,
                dry_run: settings.dry_run,
                nodes: &loads,
                plan: &plan,
                warnings: &warnings,
                execution: None,
                error: None,
            };
            write_output(out, &render::render_json(&report)?)?;
        }
        return Ok(RunOutcome::NothingToBalance);
    }

    let executor = Executor::new(evictor, settings.grace_period_seconds, settings.dry_run);
    let result = executor.execute(plan.clone()).await;
    let (execution, aborted) = match &result {
        Ok(execution) => (Some(execution), None),
        Err(err) => (err.partial_report(), Some(err.to_string())),
    };

    match settings.output {
        OutputFormat::Table => {
            if let Some(execution) = execution {
                let text = if aborted.is_some() {
                    render::render_aborted(execution, plan.len())
                } else {
                    render::render_execution(execution)
                };
                write_output(out, &text)?;
            }
        }
        OutputFormat::Json => {
            let report = RunReport {
                namespace: &settings.namespace,
                dry_run: settings.dry_run,
                nodes: &loads,
                plan: &plan,
                warnings: &warnings,
                execution,
                error: aborted,
            };
            write_output(out, &render::render_json(&report)?)?
        }
    }

    let execution = result.context(error::ExecutionSnafu)?;
    if execution.dry_run {
        Ok(RunOutcome::DryRun {
            planned: execution.skipped(),
        })
    } else {
        Ok(RunOutcome::Executed {
            succeeded: execution.succeeded(),
            failed: execution.failed(),
        })
    }
}

fn write_output<W: Write>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .context(error::WriteOutputSnafu)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use kube::error::ErrorResponse;
    use models::eviction::{EvictionError, MockEvictionClient};
    use models::inventory::{
        InventoryNode, InventoryPod, MockInventoryClient, PodOwner, PodPhase, SafeToEvict,
    };

    fn settings(dry_run: bool, output: OutputFormat) -> RunSettings {
        RunSettings {
            namespace: "shop".to_string(),
            pod_selector: "app=web".to_string(),
            node_selector: String::new(),
            grace_period_seconds: None,
            max_evictions: None,
            dry_run,
            output,
        }
    }

    fn node(name: &str) -> InventoryNode {
        InventoryNode {
            name: name.to_string(),
            schedulable: true,
            labels: Default::default(),
        }
    }

    fn pod(name: &str, node_name: &str) -> InventoryPod {
        InventoryPod {
            namespace: "shop".to_string(),
            name: name.to_string(),
            node_name: Some(node_name.to_string()),
            labels: Default::default(),
            owner: Some(PodOwner::Other("ReplicaSet".to_string())),
            mirror: false,
            safe_to_evict: SafeToEvict::Unset,
            priority: 0,
            created_at: None,
            phase: PodPhase::Running,
        }
    }

    /// Three pods on node-a and one on node-b: one eviction from node-a is planned.
    fn inventory(pods: Vec<InventoryPod>) -> MockInventoryClient {
        let mut inventory = MockInventoryClient::new();
        inventory
            .expect_list_nodes()
            .returning(|_| Ok(vec![node("node-a"), node("node-b")]));
        inventory
            .expect_list_pods()
            .with(mockall::predicate::eq("shop"), mockall::predicate::eq("app=web"))
            .returning(move |_, _| Ok(pods.clone()));
        inventory
    }

    fn unbalanced() -> Vec<InventoryPod> {
        vec![
            pod("web-1", "node-a"),
            pod("web-2", "node-a"),
            pod("web-3", "node-a"),
            pod("web-4", "node-b"),
        ]
    }

    #[tokio::test]
    async fn test_dry_run_reports_plan_without_evicting() {
        let mut evictor = MockEvictionClient::new();
        evictor.expect_evict().times(0);

        let mut out = Vec::new();
        let outcome = run(
            &settings(true, OutputFormat::Table),
            &inventory(unbalanced()),
            evictor,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::DryRun { planned: 1 });
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Planned evictions: 1"));
        assert!(output.contains("shop/web-1"));
        assert!(output.contains("Dry run: 1 eviction(s) planned"));
    }

    #[tokio::test]
    async fn test_balanced_run_is_a_no_op() {
        let mut evictor = MockEvictionClient::new();
        evictor.expect_evict().times(0);

        let mut out = Vec::new();
        let outcome = run(
            &settings(false, OutputFormat::Table),
            &inventory(vec![pod("web-1", "node-a"), pod("web-2", "node-b")]),
            evictor,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(outcome, RunOutcome::NothingToBalance);
        assert_eq!(outcome.exit_code(), EXIT_NOTHING_TO_BALANCE);
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("already balanced"));
    }

    #[tokio::test]
    async fn test_degraded_run_still_succeeds() {
        let mut evictor = MockEvictionClient::new();
        evictor.expect_evict().times(1).returning(|request| {
            Err(EvictionError::from_kube_error(
                kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message: "Cannot evict pod as it would violate the pod's disruption budget."
                        .to_string(),
                    reason: "TooManyRequests".to_string(),
                    code: 429,
                }),
                &request.pod_name,
            ))
        });

        let mut out = Vec::new();
        let outcome = run(
            &settings(false, OutputFormat::Json),
            &inventory(unbalanced()),
            evictor,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Executed {
                succeeded: 0,
                failed: 1
            }
        );
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["plan"]["candidates"][0]["pod"]["name"], "web-1");
        assert_eq!(
            value["execution"]["outcomes"][0]["state"]["reason"],
            "DisruptionBudget"
        );
    }

    #[tokio::test]
    async fn test_no_matching_nodes_fails() {
        let mut inventory = MockInventoryClient::new();
        inventory.expect_list_nodes().returning(|_| Ok(vec![]));
        inventory.expect_list_pods().returning(|_, _| Ok(vec![]));

        let mut out = Vec::new();
        let err = run(
            &settings(false, OutputFormat::Table),
            &inventory,
            MockEvictionClient::new(),
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Planning { .. }));
        assert!(out.is_empty());
    }

    /// Six pods on node-a and none on node-b: three evictions are planned, the third loses the connection.
    fn connection_lost_after_two() -> (MockInventoryClient, MockEvictionClient) {
        let pods = (1..=6)
            .map(|index| pod(&format!("web-{}", index), "node-a"))
            .collect();
        let mut evictor = MockEvictionClient::new();
        evictor
            .expect_evict()
            .withf(|request| request.pod_name != "web-3")
            .times(2)
            .returning(|_| Ok(()));
        evictor
            .expect_evict()
            .withf(|request| request.pod_name == "web-3")
            .times(1)
            .returning(|request| {
                Err(EvictionError::from_kube_error(
                    kube::Error::LinesCodecMaxLineLengthExceeded,
                    &request.pod_name,
                ))
            });
        (inventory(pods), evictor)
    }

    #[tokio::test]
    async fn test_transport_failure_reports_completed_evictions() {
        let (inventory, evictor) = connection_lost_after_two();

        let mut out = Vec::new();
        let err = run(
            &settings(false, OutputFormat::Table),
            &inventory,
            evictor,
            &mut out,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Execution { .. }));
        assert!(err
            .to_string()
            .contains("3 of 3 planned evictions were attempted, 2 succeeded"));
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Planned evictions: 3"));
        assert!(output.contains("Aborted after 3 of 3 planned eviction(s): 2 succeeded, 1 failed."));
        assert!(output.contains("shop/web-3"));
    }

    #[tokio::test]
    async fn test_transport_failure_still_writes_json_report() {
        let (inventory, evictor) = connection_lost_after_two();

        let mut out = Vec::new();
        run(
            &settings(false, OutputFormat::Json),
            &inventory,
            evictor,
            &mut out,
        )
        .await
        .unwrap_err();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["plan"]["candidates"].as_array().unwrap().len(), 3);
        let outcomes = value["execution"]["outcomes"].as_array().unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[1]["state"]["state"], "Succeeded");
        assert_eq!(outcomes[2]["state"]["reason"], "Transport");
        assert!(value["error"].as_str().unwrap().contains("2 succeeded"));
    }

    #[tokio::test]
    async fn test_eviction_cap_of_zero_is_not_a_no_op() {
        let mut evictor = MockEvictionClient::new();
        evictor.expect_evict().times(0);
        let mut capped = settings(false, OutputFormat::Table);
        capped.max_evictions = Some(0);

        let mut out = Vec::new();
        let outcome = run(&capped, &inventory(unbalanced()), evictor, &mut out)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Executed {
                succeeded: 0,
                failed: 0
            }
        );
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("dropped by --max-evictions"));
        assert!(output.contains("Reached --max-evictions limit: 0 of 1"));
    }

    #[test]
    fn test_settings_from_arguments() {
        let args = Arguments {
            namespace: "shop".to_string(),
            selector: Some("app=web".to_string()),
            node_selector: None,
            kubeconfig: None,
            context: None,
            grace_period: Some(10),
            max_evictions: Some(3),
            dry_run: true,
            output: OutputFormat::Json,
        };
        let settings = RunSettings::from(&args);
        assert_eq!(settings.pod_selector, "app=web");
        assert_eq!(settings.node_selector, "");
        assert_eq!(settings.grace_period_seconds, Some(10));
        assert_eq!(settings.max_evictions, Some(3));
        assert!(settings.dry_run);
    }
}
