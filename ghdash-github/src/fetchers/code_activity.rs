//! Code activity from three statistics endpoints, fetched concurrently:
//! `code_frequency` (weekly additions/deletions), `commit_activity` (daily
//! commits per week) and `participation` (owner vs everyone, weekly).

use async_trait::async_trait;
use futures_util::join;
use ghdash_core::{
    CacheDomain, CodeActivityPayload, CodeChangeWeek, CommitWeek, DomainFetcher, FetchError,
    FetchOutcome, ResourceKey,
};
use serde::Deserialize;

use super::{to_payload, week_label};
use crate::client::GithubClient;
use crate::transport::Endpoint;

#[derive(Debug, Deserialize)]
struct RawCommitWeek {
    #[serde(default)]
    week: i64,
    #[serde(default)]
    total: u32,
    #[serde(default)]
    days: Vec<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawParticipation {
    all: Vec<u32>,
    owner: Vec<u32>,
}

pub struct CodeActivityFetcher {
    client: GithubClient,
}

impl CodeActivityFetcher {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }
}

/// `[timestamp, additions, deletions]` rows; deletions arrive negative.
fn code_changes(rows: Vec<Vec<i64>>) -> Vec<CodeChangeWeek> {
    rows.into_iter()
        .filter(|row| row.len() >= 3)
        .map(|row| CodeChangeWeek {
            week: week_label(row[0]),
            additions: row[1].unsigned_abs(),
            deletions: row[2].unsigned_abs(),
        })
        .collect()
}

fn weekly_commits(weeks: Vec<RawCommitWeek>) -> Vec<CommitWeek> {
    weeks
        .into_iter()
        .map(|w| {
            let mut days = [0u32; 7];
            for (slot, count) in days.iter_mut().zip(w.days) {
                *slot = count;
            }
            CommitWeek {
                week: week_label(w.week),
                total: w.total,
                days,
            }
        })
        .collect()
}

/// Everyone's weekly commits minus the owner's, never below zero.
fn community_commits(participation: &RawParticipation) -> Vec<u32> {
    participation
        .all
        .iter()
        .enumerate()
        .map(|(i, all)| all.saturating_sub(participation.owner.get(i).copied().unwrap_or(0)))
        .collect()
}

#[async_trait]
impl DomainFetcher for CodeActivityFetcher {
    fn domain(&self) -> CacheDomain {
        CacheDomain::CodeActivity
    }

    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError> {
        let frequency_endpoint = Endpoint::repo(key, "stats/code_frequency");
        let activity_endpoint = Endpoint::repo(key, "stats/commit_activity");
        let participation_endpoint = Endpoint::repo(key, "stats/participation");

        let (frequency, activity, participation) = join!(
            self.client.stats_as::<Vec<Vec<i64>>>(&frequency_endpoint, None),
            self.client.stats_as::<Vec<RawCommitWeek>>(&activity_endpoint, None),
            self.client.stats_as::<RawParticipation>(&participation_endpoint, None),
        );
        let (frequency, activity, participation) = (frequency?, activity?, participation?);

        let participation = participation.unwrap_or_default();
        let payload = CodeActivityPayload {
            code_changes: code_changes(frequency.unwrap_or_default()),
            weekly_commits: weekly_commits(activity.unwrap_or_default()),
            community_commits: community_commits(&participation),
            owner_commits: participation.owner,
        };

        if payload.code_changes.is_empty()
            && payload.weekly_commits.is_empty()
            && payload.owner_commits.is_empty()
            && payload.community_commits.is_empty()
        {
            tracing::warn!(%key, "No code activity from upstream");
            return Ok(FetchOutcome::NoData);
        }

        Ok(FetchOutcome::Data(to_payload(
            CacheDomain::CodeActivity,
            &payload,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InstantSleeper, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn key() -> ResourceKey {
        "acme/widgets".parse().expect("key")
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> CodeActivityFetcher {
        CodeActivityFetcher::new(
            GithubClient::new(transport).with_sleeper(Arc::new(InstantSleeper::new())),
        )
    }

    #[tokio::test]
    async fn test_combines_three_sources() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(
            "repos/acme/widgets/stats/code_frequency",
            json!([[1_700_352_000, 120, -45], [1_700_956_800, 0, 0], [1]]),
        );
        transport.push_json(
            "repos/acme/widgets/stats/commit_activity",
            json!([{ "week": 1_700_352_000, "total": 6, "days": [0, 1, 2, 3, 0, 0, 0] }]),
        );
        transport.push_json(
            "repos/acme/widgets/stats/participation",
            json!({ "all": [5, 3, 1], "owner": [2, 4] }),
        );

        let value = fetcher(transport)
            .fetch(&key())
            .await
            .expect("fetch")
            .into_data()
            .expect("data");
        let payload: CodeActivityPayload = serde_json::from_value(value).expect("decode");

        assert_eq!(payload.code_changes.len(), 2);
        assert_eq!(payload.code_changes[0].week, "2023-11-19");
        assert_eq!(payload.code_changes[0].deletions, 45);
        assert_eq!(payload.weekly_commits[0].days, [0, 1, 2, 3, 0, 0, 0]);
        assert_eq!(payload.owner_commits, vec![2, 4]);
        assert_eq!(payload.community_commits, vec![3, 0, 1]);
    }

    #[tokio::test]
    async fn test_one_source_is_enough() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_pending("repos/acme/widgets/stats/code_frequency");
        transport.push_pending("repos/acme/widgets/stats/commit_activity");
        transport.push_json(
            "repos/acme/widgets/stats/participation",
            json!({ "all": [1], "owner": [0] }),
        );

        let outcome = fetcher(transport).fetch(&key()).await.expect("fetch");
        let payload: CodeActivityPayload =
            serde_json::from_value(outcome.into_data().expect("data")).expect("decode");
        assert!(payload.code_changes.is_empty());
        assert_eq!(payload.community_commits, vec![1]);
    }

    #[tokio::test]
    async fn test_all_pending_is_no_data() {
        let transport = Arc::new(ScriptedTransport::new());
        for path in ["code_frequency", "commit_activity", "participation"] {
            transport.push_pending(&format!("repos/acme/widgets/stats/{}", path));
        }

        assert_eq!(fetcher(transport).fetch(&key()).await, Ok(FetchOutcome::NoData));
    }

    #[test]
    fn test_short_days_are_padded() {
        let weeks = weekly_commits(vec![RawCommitWeek {
            week: 0,
            total: 2,
            days: vec![1, 1],
        }]);
        assert_eq!(weeks[0].days, [1, 1, 0, 0, 0, 0, 0]);
    }
}
