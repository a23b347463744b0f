//! Code activity window and its summary.

use ghdash_core::CodeActivityPayload;
use serde::{Deserialize, Serialize};

use super::{percentage, round_to};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub total_commits: u64,
    /// One decimal
    pub avg_weekly_commits: f64,
    pub total_additions: u64,
    pub total_deletions: u64,
    /// First week with the highest commit count; `None` when no week has commits
    pub peak_week: Option<String>,
    pub peak_commits: u32,
    /// Owner share of owner plus community commits, one decimal
    pub owner_percentage: f64,
}

/// The served series plus its summary, flattened into one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeActivityView {
    #[serde(flatten)]
    pub series: CodeActivityPayload,
    pub summary: ActivitySummary,
}

impl CodeActivityView {
    /// Keep the last `weeks` of every series and summarize what is left.
    pub fn last_weeks(mut series: CodeActivityPayload, weeks: usize) -> Self {
        series.trim_to_weeks(weeks);
        let summary = summarize_activity(&series);
        Self { series, summary }
    }
}

pub fn summarize_activity(series: &CodeActivityPayload) -> ActivitySummary {
    let total_commits: u64 = series.weekly_commits.iter().map(|w| u64::from(w.total)).sum();

    let mut peak_week = None;
    let mut peak_commits = 0;
    for week in &series.weekly_commits {
        if week.total > peak_commits {
            peak_commits = week.total;
            peak_week = Some(week.week.clone());
        }
    }

    let owner: u64 = series.owner_commits.iter().copied().map(u64::from).sum();
    let community: u64 = series.community_commits.iter().copied().map(u64::from).sum();

    ActivitySummary {
        total_commits,
        avg_weekly_commits: if series.weekly_commits.is_empty() {
            0.0
        } else {
            round_to(total_commits as f64 / series.weekly_commits.len() as f64, 1)
        },
        total_additions: series.code_changes.iter().map(|c| c.additions).sum(),
        total_deletions: series.code_changes.iter().map(|c| c.deletions).sum(),
        peak_week,
        peak_commits,
        owner_percentage: percentage(owner, owner + community),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghdash_core::{CodeChangeWeek, CommitWeek};

    fn series(totals: &[u32]) -> CodeActivityPayload {
        CodeActivityPayload {
            code_changes: totals
                .iter()
                .enumerate()
                .map(|(i, _)| CodeChangeWeek {
                    week: format!("w{}", i),
                    additions: 100,
                    deletions: 40,
                })
                .collect(),
            weekly_commits: totals
                .iter()
                .enumerate()
                .map(|(i, &total)| CommitWeek {
                    week: format!("w{}", i),
                    total,
                    days: [0; 7],
                })
                .collect(),
            owner_commits: vec![1; totals.len()],
            community_commits: vec![3; totals.len()],
        }
    }

    #[test]
    fn test_summary_totals_and_peak() {
        let summary = summarize_activity(&series(&[2, 9, 4, 9]));

        assert_eq!(summary.total_commits, 24);
        assert_eq!(summary.avg_weekly_commits, 6.0);
        assert_eq!(summary.total_additions, 400);
        assert_eq!(summary.total_deletions, 160);
        // Ties keep the earlier week.
        assert_eq!(summary.peak_week.as_deref(), Some("w1"));
        assert_eq!(summary.peak_commits, 9);
        assert_eq!(summary.owner_percentage, 25.0);
    }

    #[test]
    fn test_summary_covers_only_the_window() {
        let view = CodeActivityView::last_weeks(series(&[50, 1, 2, 3]), 3);

        assert_eq!(view.series.weekly_commits.len(), 3);
        assert_eq!(view.summary.total_commits, 6);
        assert_eq!(view.summary.avg_weekly_commits, 2.0);
        assert_eq!(view.summary.peak_week.as_deref(), Some("w3"));
    }

    #[test]
    fn test_empty_series() {
        let summary = summarize_activity(&CodeActivityPayload::default());
        assert_eq!(summary, ActivitySummary::default());
    }

    #[test]
    fn test_view_flattens_series_beside_summary() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(CodeActivityView::last_weeks(series(&[1, 2]), 52))?;
        assert_eq!(json["weekly_commits"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["summary"]["total_commits"], 3);
        Ok(())
    }
}
