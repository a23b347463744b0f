//! Workflow run filtering and aggregate statistics.
//!
//! Filters apply to the cached run list only. `all_time_total` always
//! reports the repository total, whatever the filter.

use std::collections::BTreeMap;

use ghdash_core::{Workflow, WorkflowPayload, WorkflowRun};
use serde::{Deserialize, Serialize};

use super::{percentage, round_to};

const SUCCESS: &str = "success";
const FAILURE: &str = "failure";

/// Run filters from the query string. Empty values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkflowFilter {
    /// Numeric workflow id; a value that does not parse filters nothing.
    pub workflow_id: Option<String>,
    pub branch: Option<String>,
    pub event: Option<String>,
    pub conclusion: Option<String>,
    /// Matches either status or conclusion. Ignored when `conclusion` is set.
    pub status: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl WorkflowFilter {
    pub fn matches(&self, run: &WorkflowRun) -> bool {
        if let Some(id) = non_empty(&self.workflow_id).and_then(|id| id.trim().parse::<u64>().ok()) {
            if run.workflow_id != id {
                return false;
            }
        }
        if let Some(branch) = non_empty(&self.branch) {
            if run.head_branch.as_deref() != Some(branch) {
                return false;
            }
        }
        if let Some(event) = non_empty(&self.event) {
            if run.event.as_deref() != Some(event) {
                return false;
            }
        }
        match (non_empty(&self.conclusion), non_empty(&self.status)) {
            (Some(conclusion), _) => run.conclusion.as_deref() == Some(conclusion),
            (None, Some(status)) => {
                run.status.as_deref() == Some(status) || run.conclusion.as_deref() == Some(status)
            }
            (None, None) => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunCount {
    pub total: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    /// Runs left after filtering
    pub total_runs: u64,
    pub all_time_total: u64,
    /// Successes over completed (success or failure) runs, one decimal
    pub pass_rate: f64,
    /// Mean duration of completed runs, whole seconds
    pub avg_duration: i64,
    pub failure_count: u64,
    pub success_count: u64,
    /// Keyed by workflow name
    pub runs_by_workflow: BTreeMap<String, WorkflowRunCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowView {
    pub runs: Vec<WorkflowRun>,
    pub stats: WorkflowStats,
    pub workflows: Vec<Workflow>,
}

/// Apply `filter` to the cached runs and compute their statistics.
pub fn filter_runs(payload: WorkflowPayload, filter: &WorkflowFilter) -> WorkflowView {
    let runs: Vec<WorkflowRun> = payload
        .runs
        .into_iter()
        .filter(|run| filter.matches(run))
        .collect();

    let mut stats = WorkflowStats {
        total_runs: runs.len() as u64,
        all_time_total: payload.all_time_total,
        ..WorkflowStats::default()
    };
    let mut total_duration = 0i64;

    for run in &runs {
        let conclusion = run.conclusion.as_deref();
        match conclusion {
            Some(SUCCESS) => stats.success_count += 1,
            Some(FAILURE) => stats.failure_count += 1,
            _ => {}
        }
        if matches!(conclusion, Some(SUCCESS | FAILURE)) {
            total_duration += run.duration_seconds;
        }

        let name = run.name.clone().unwrap_or_else(|| "Unknown".to_string());
        let count = stats.runs_by_workflow.entry(name).or_default();
        count.total += 1;
        if conclusion == Some(FAILURE) {
            count.failures += 1;
        }
    }

    let completed = stats.success_count + stats.failure_count;
    stats.pass_rate = percentage(stats.success_count, completed);
    if completed > 0 {
        stats.avg_duration = round_to(total_duration as f64 / completed as f64, 0) as i64;
    }

    WorkflowView {
        runs,
        stats,
        workflows: payload.workflows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: u64, name: &str, workflow_id: u64, conclusion: Option<&str>, branch: &str) -> WorkflowRun {
        WorkflowRun {
            id,
            name: Some(name.to_string()),
            workflow_id,
            status: Some(if conclusion.is_some() { "completed" } else { "in_progress" }.to_string()),
            conclusion: conclusion.map(str::to_string),
            event: Some(if branch == "main" { "push" } else { "pull_request" }.to_string()),
            head_branch: Some(branch.to_string()),
            run_number: id,
            run_attempt: 1,
            created_at: None,
            updated_at: None,
            run_started_at: None,
            html_url: None,
            actor_login: None,
            duration_seconds: 60 * id as i64,
        }
    }

    fn payload() -> WorkflowPayload {
        WorkflowPayload {
            runs: vec![
                run(1, "CI", 7, Some("success"), "main"),
                run(2, "CI", 7, Some("failure"), "feature"),
                run(3, "CI", 7, Some("success"), "main"),
                run(4, "Release", 9, Some("cancelled"), "main"),
                run(5, "Release", 9, None, "main"),
            ],
            workflows: Vec::new(),
            all_time_total: 1200,
        }
    }

    #[test]
    fn test_unfiltered_stats() {
        let view = filter_runs(payload(), &WorkflowFilter::default());
        let stats = &view.stats;

        assert_eq!(stats.total_runs, 5);
        assert_eq!(stats.all_time_total, 1200);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.pass_rate, 66.7);
        // (60 + 120 + 180) / 3, cancelled and running runs excluded
        assert_eq!(stats.avg_duration, 120);
        assert_eq!(stats.runs_by_workflow["CI"], WorkflowRunCount { total: 3, failures: 1 });
        assert_eq!(stats.runs_by_workflow["Release"], WorkflowRunCount { total: 2, failures: 0 });
    }

    #[test]
    fn test_filters_combine() {
        let filter = WorkflowFilter {
            workflow_id: Some("7".to_string()),
            branch: Some("main".to_string()),
            event: Some("push".to_string()),
            ..WorkflowFilter::default()
        };
        let view = filter_runs(payload(), &filter);

        let ids: Vec<u64> = view.runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(view.stats.pass_rate, 100.0);
        assert_eq!(view.stats.all_time_total, 1200);
    }

    #[test]
    fn test_conclusion_wins_over_status() {
        let filter = WorkflowFilter {
            conclusion: Some("failure".to_string()),
            status: Some("in_progress".to_string()),
            ..WorkflowFilter::default()
        };
        let ids: Vec<u64> = filter_runs(payload(), &filter).runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_status_matches_status_or_conclusion() {
        let in_progress = WorkflowFilter {
            status: Some("in_progress".to_string()),
            ..WorkflowFilter::default()
        };
        let ids: Vec<u64> = filter_runs(payload(), &in_progress).runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5]);

        let cancelled = WorkflowFilter {
            status: Some("cancelled".to_string()),
            ..WorkflowFilter::default()
        };
        let ids: Vec<u64> = filter_runs(payload(), &cancelled).runs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn test_unparseable_workflow_id_and_empty_values_filter_nothing() {
        let filter = WorkflowFilter {
            workflow_id: Some("ci".to_string()),
            branch: Some(String::new()),
            ..WorkflowFilter::default()
        };
        assert_eq!(filter_runs(payload(), &filter).stats.total_runs, 5);
    }

    #[test]
    fn test_no_completed_runs() {
        let view = filter_runs(WorkflowPayload::default(), &WorkflowFilter::default());
        assert_eq!(view.stats.pass_rate, 0.0);
        assert_eq!(view.stats.avg_duration, 0);
        assert!(view.stats.runs_by_workflow.is_empty());
    }
}
