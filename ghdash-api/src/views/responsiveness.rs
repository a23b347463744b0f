//! Review responsiveness, derived from the cached pull request lifecycle.
//!
//! Response time is measured from pull request creation to each submitted
//! review. Reviews submitted before the pull request was created (clock
//! skew, imported history) are counted but not timed.

use std::collections::BTreeMap;

use ghdash_core::{PullRequestLifecycle, Timestamp};
use serde::{Deserialize, Serialize};

use super::{hours_between, mean, median, percentage, round_to};
use crate::constants::MAX_REVIEW_BOTTLENECKS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewerResponsiveness {
    pub reviewer: String,
    pub reviews: u32,
    pub approvals: u32,
    pub changes_requested: u32,
    /// Percentage of reviews that approved, one decimal.
    pub approval_rate: f64,
    pub avg_response_hours: Option<f64>,
    pub median_response_hours: Option<f64>,
}

/// An open pull request nobody has reviewed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewBottleneck {
    pub number: u64,
    pub title: String,
    pub author: Option<String>,
    pub wait_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponsiveness {
    /// Fastest average responder first; reviewers with no timed reviews last.
    pub leaderboard: Vec<ReviewerResponsiveness>,
    /// Longest wait first.
    pub bottlenecks: Vec<ReviewBottleneck>,
    pub avg_team_response_hours: Option<f64>,
    pub median_team_response_hours: Option<f64>,
    pub fastest_reviewer: Option<String>,
    /// All open unreviewed pull requests, not only those listed.
    pub prs_awaiting_review: usize,
}

#[derive(Default)]
struct Tally {
    hours: Vec<f64>,
    reviews: u32,
    approvals: u32,
    changes_requested: u32,
}

/// Build the responsiveness report for `pulls` as of `now`.
pub fn review_responsiveness(pulls: &[PullRequestLifecycle], now: Timestamp) -> ReviewResponsiveness {
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
    let mut bottlenecks = Vec::new();

    for pull in pulls {
        let Some(created_at) = pull.created_at else {
            continue;
        };

        for review in &pull.all_reviews {
            let reviewer = review.login.clone().unwrap_or_else(|| "unknown".to_string());
            let tally = tallies.entry(reviewer).or_default();
            tally.reviews += 1;
            match review.state.to_ascii_uppercase().as_str() {
                "APPROVED" => tally.approvals += 1,
                "CHANGES_REQUESTED" => tally.changes_requested += 1,
                _ => {}
            }
            if let Some(submitted_at) = review.submitted_at {
                let hours = hours_between(created_at, submitted_at);
                if hours >= 0.0 {
                    tally.hours.push(hours);
                }
            }
        }

        if pull.state == "open" && pull.all_reviews.is_empty() {
            bottlenecks.push(ReviewBottleneck {
                number: pull.number,
                title: pull.title.clone(),
                author: pull.author.clone(),
                wait_hours: round_to(hours_between(created_at, now).max(0.0), 1),
            });
        }
    }

    let all_hours: Vec<f64> = tallies.values().flat_map(|t| t.hours.iter().copied()).collect();

    let mut leaderboard: Vec<ReviewerResponsiveness> = tallies
        .into_iter()
        .map(|(reviewer, tally)| ReviewerResponsiveness {
            reviewer,
            reviews: tally.reviews,
            approvals: tally.approvals,
            changes_requested: tally.changes_requested,
            approval_rate: percentage(u64::from(tally.approvals), u64::from(tally.reviews)),
            avg_response_hours: mean(&tally.hours).map(|h| round_to(h, 2)),
            median_response_hours: median(&tally.hours).map(|h| round_to(h, 2)),
        })
        .collect();
    leaderboard.sort_by(|a, b| {
        let a_avg = a.avg_response_hours.unwrap_or(f64::INFINITY);
        let b_avg = b.avg_response_hours.unwrap_or(f64::INFINITY);
        a_avg.total_cmp(&b_avg).then_with(|| a.reviewer.cmp(&b.reviewer))
    });

    bottlenecks.sort_by(|a, b| b.wait_hours.total_cmp(&a.wait_hours));
    let prs_awaiting_review = bottlenecks.len();
    bottlenecks.truncate(MAX_REVIEW_BOTTLENECKS);

    ReviewResponsiveness {
        fastest_reviewer: leaderboard
            .first()
            .filter(|r| r.avg_response_hours.is_some())
            .map(|r| r.reviewer.clone()),
        leaderboard,
        bottlenecks,
        avg_team_response_hours: mean(&all_hours).map(|h| round_to(h, 2)),
        median_team_response_hours: median(&all_hours).map(|h| round_to(h, 2)),
        prs_awaiting_review,
    }
}
