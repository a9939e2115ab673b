//! Formats plans and execution reports for the terminal, or as a JSON document.
use crate::error::{self, Result};

use chrono::{DateTime, Utc};
use planner::load::NodeLoad;
use planner::{CandidateState, ExecutionReport, Plan, PlanWarning};
use serde::Serialize;
use snafu::ResultExt;
use tabled::{settings::Style, Table, Tabled};

const BALANCED_MESSAGE: &str = "Workload distribution already balanced across nodes.";

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Namespace/Pod")]
    pod: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Target")]
    target: usize,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Namespace/Pod")]
    pod: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Formats the time elapsed since `created_at` compactly, e.g. `3d4h`, `2h15m`, `5m2s` or `40s`.
pub fn format_age(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let created_at = match created_at {
        Some(created_at) => created_at,
        None => return "n/a".to_string(),
    };
    let seconds_total = (now - created_at).num_seconds();
    if seconds_total <= 0 {
        return "0s".to_string();
    }

    let (minutes, seconds) = (seconds_total / 60, seconds_total % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);
    if days > 0 {
        format!("{}d{}h", days, hours)
    } else if hours > 0 {
        format!("{}h{}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn render_warnings(warnings: &[PlanWarning]) -> String {
    warnings
        .iter()
        .map(|warning| format!("Warning: {}\n", warning))
        .collect()
}

/// Renders the plan as a table, followed by any warnings.
pub fn render_plan(
    loads: &[NodeLoad],
    plan: &Plan,
    warnings: &[PlanWarning],
    now: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    if plan.is_empty() {
        if loads.iter().all(|load| load.surplus() == 0) {
            output.push_str(BALANCED_MESSAGE);
        } else if plan.is_capped() {
            output.push_str(&format!(
                "All {} planned eviction(s) were dropped by --max-evictions.",
                plan.uncapped_len()
            ));
        } else {
            output.push_str("No pods can be evicted to improve the workload distribution.");
        }
        output.push('\n');
        output.push_str(&render_warnings(warnings));
        return output;
    }

    output.push_str("Eviction plan\n");
    output.push_str(&format!("  Planned evictions: {}\n", plan.len()));
    output.push_str(&format!(
        "  Affected nodes:    {}\n",
        plan.affected_nodes().len()
    ));

    let rows = plan.candidates().iter().map(|candidate| PlanRow {
        node: candidate.node.clone(),
        pod: candidate.pod.qualified_name(),
        priority: candidate.pod.priority,
        age: format_age(candidate.pod.created_at, now),
        load: format!("{} -> {}", candidate.load_before, candidate.load_after),
        target: candidate.target,
    });
    output.push_str(&Table::new(rows).with(Style::rounded()).to_string());
    output.push('\n');
    output.push_str(&render_warnings(warnings));
    output
}

fn failure_rows(report: &ExecutionReport) -> Vec<FailureRow> {
    report
        .outcomes
        .iter()
        .filter_map(|outcome| match &outcome.state {
            CandidateState::Failed { reason, message } => Some(FailureRow {
                pod: outcome.candidate.pod.qualified_name(),
                node: outcome.candidate.node.clone(),
                reason: reason.clone(),
                message: message.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Summarizes the outcome of executing a plan.
pub fn render_execution(report: &ExecutionReport) -> String {
    if report.dry_run {
        return format!(
            "Dry run: {} eviction(s) planned, none were issued.\n",
            report.skipped()
        );
    }

    let failures = failure_rows(report);

    if failures.is_empty() {
        return format!(
            "Successfully issued {} eviction request(s).\n",
            report.succeeded()
        );
    }

    format!(
        "{} of {} eviction(s) succeeded, {} failed.\n{}\n",
        report.succeeded(),
        report.outcomes.len(),
        failures.len(),
        Table::new(failures).with(Style::rounded())
    )
}

/// Summarizes an execution that was aborted after `report.outcomes` of `planned` candidates.
pub fn render_aborted(report: &ExecutionReport, planned: usize) -> String {
    format!(
        "Aborted after {} of {} planned eviction(s): {} succeeded, {} failed.\n{}\n",
        report.attempted(),
        planned,
        report.succeeded(),
        report.failed(),
        Table::new(failure_rows(report)).with(Style::rounded())
    )
}

/// The document written in JSON output mode.
#[derive(Serialize)]
pub struct RunReport<'a> {
    pub namespace: &'a str,
    pub dry_run: bool,
    pub nodes: &'a [NodeLoad],
    pub plan: &'a Plan,
    pub warnings: &'a [PlanWarning],
    /// Absent when there was nothing to execute.
    pub execution: Option<&'a ExecutionReport>,
    /// Set when execution was aborted; `execution` then holds the outcomes up to the abort.
    pub error: Option<String>,
}

pub fn render_json(report: &RunReport<'_>) -> Result<String> {
    let mut output = serde_json::to_string_pretty(report).context(error::SerializeReportSnafu)?;
    output.push('\n');
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};
    use models::inventory::{InventoryPod, PodPhase, SafeToEvict};
    use planner::{CandidateOutcome, EvictionCandidate};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn candidate(name: &str, node: &str, load_before: usize) -> EvictionCandidate {
        EvictionCandidate {
            pod: InventoryPod {
                namespace: "shop".to_string(),
                name: name.to_string(),
                node_name: Some(node.to_string()),
                labels: Default::default(),
                owner: None,
                mirror: false,
                safe_to_evict: SafeToEvict::Unset,
                priority: 7,
                created_at: Some(now() - Duration::minutes(90)),
                phase: PodPhase::Running,
            },
            node: node.to_string(),
            current_load: 5,
            target: 3,
            load_before,
            load_after: load_before - 1,
        }
    }

    fn load(node: &str, occupancy: usize, target: usize) -> NodeLoad {
        NodeLoad {
            node: node.to_string(),
            occupancy,
            evictable: occupancy,
            target,
        }
    }

    #[test]
    fn test_format_age() {
        let test_cases = vec![
            (None, "n/a"),
            (Some(now() + Duration::seconds(5)), "0s"),
            (Some(now()), "0s"),
            (Some(now() - Duration::seconds(42)), "42s"),
            (Some(now() - Duration::seconds(5 * 60 + 2)), "5m2s"),
            (Some(now() - Duration::minutes(135)), "2h15m"),
            (Some(now() - Duration::hours(76)), "3d4h"),
        ];
        for (created_at, expected) in test_cases {
            assert_eq!(format_age(created_at, now()), expected);
        }
    }

    #[test]
    fn test_render_balanced() {
        let output = render_plan(&[load("node-a", 2, 2)], &Plan::default(), &[], now());
        assert_eq!(output, format!("{}\n", BALANCED_MESSAGE));
    }

    #[test]
    fn test_render_blocked_node() {
        let warnings = vec![PlanWarning::PartialConvergence {
            node: "node-a".to_string(),
            surplus: 2,
            evictable: 0,
        }];
        let output = render_plan(&[load("node-a", 4, 2)], &Plan::default(), &warnings, now());
        assert!(output.starts_with("No pods can be evicted"));
        assert!(output.contains("Warning: Node node-a is 2 pods over target"));
    }

    #[test]
    fn test_render_plan_table() {
        let plan = Plan::new(vec![
            candidate("web-1", "node-a", 5),
            candidate("web-2", "node-a", 4),
        ]);
        let output = render_plan(&[load("node-a", 5, 3)], &plan, &[], now());

        assert!(output.contains("Planned evictions: 2"));
        assert!(output.contains("Affected nodes:    1"));
        assert!(output.contains("Namespace/Pod"));
        assert!(output.contains("shop/web-1"));
        assert!(output.contains("5 -> 4"));
        assert!(output.contains("4 -> 3"));
        assert!(output.contains("1h30m"));
        assert!(!output.contains("Warning"));
    }

    #[test]
    fn test_render_execution() {
        let dry_run = ExecutionReport {
            dry_run: true,
            outcomes: vec![CandidateOutcome {
                candidate: candidate("web-1", "node-a", 5),
                state: CandidateState::DryRunSkipped,
            }],
        };
        assert_eq!(
            render_execution(&dry_run),
            "Dry run: 1 eviction(s) planned, none were issued.\n"
        );

        let succeeded = ExecutionReport {
            dry_run: false,
            outcomes: vec![CandidateOutcome {
                candidate: candidate("web-1", "node-a", 5),
                state: CandidateState::Succeeded,
            }],
        };
        assert_eq!(
            render_execution(&succeeded),
            "Successfully issued 1 eviction request(s).\n"
        );

        let degraded = ExecutionReport {
            dry_run: false,
            outcomes: vec![
                CandidateOutcome {
                    candidate: candidate("web-1", "node-a", 5),
                    state: CandidateState::Succeeded,
                },
                CandidateOutcome {
                    candidate: candidate("web-2", "node-a", 4),
                    state: CandidateState::Failed {
                        reason: "DisruptionBudget".to_string(),
                        message: "rejected".to_string(),
                    },
                },
            ],
        };
        let output = render_execution(&degraded);
        assert!(output.starts_with("1 of 2 eviction(s) succeeded, 1 failed."));
        assert!(output.contains("shop/web-2"));
        assert!(output.contains("DisruptionBudget"));
    }

    #[test]
    fn test_render_json() {
        let plan = Plan::new(vec![candidate("web-1", "node-a", 5)]);
        let loads = vec![load("node-a", 5, 4)];
        let warnings = vec![PlanWarning::EvictionCapReached { planned: 2, cap: 1 }];
        let output = render_json(&RunReport {
            namespace: "shop",
            dry_run: true,
            nodes: &loads,
            plan: &plan,
            warnings: &warnings,
            execution: None,
            error: None,
        })
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["namespace"], "shop");
        assert_eq!(value["nodes"][0]["target"], 4);
        assert_eq!(value["plan"]["candidates"][0]["pod"]["name"], "web-1");
        assert_eq!(value["plan"]["candidates"][0]["pod"]["safe_to_evict"], "Unset");
        assert_eq!(value["warnings"][0]["type"], "EvictionCapReached");
        assert!(value["execution"].is_null());
        assert!(value["error"].is_null());
    }

    #[test]
    fn test_render_capped_to_nothing() {
        let plan = Plan::new(vec![candidate("web-1", "node-a", 5)]).truncate(0);
        let output = render_plan(&[load("node-a", 5, 4)], &plan, &[], now());
        assert!(output.starts_with("All 1 planned eviction(s) were dropped by --max-evictions."));
    }

    #[test]
    fn test_render_aborted() {
        let report = ExecutionReport {
            dry_run: false,
            outcomes: vec![
                CandidateOutcome {
                    candidate: candidate("web-1", "node-a", 5),
                    state: CandidateState::Succeeded,
                },
                CandidateOutcome {
                    candidate: candidate("web-2", "node-a", 4),
                    state: CandidateState::Failed {
                        reason: "Transport".to_string(),
                        message: "connection reset".to_string(),
                    },
                },
            ],
        };
        let output = render_aborted(&report, 3);
        assert!(output.starts_with("Aborted after 2 of 3 planned eviction(s): 1 succeeded, 1 failed."));
        assert!(output.contains("shop/web-2"));
        assert!(output.contains("Transport"));
    }
}
