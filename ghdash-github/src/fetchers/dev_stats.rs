//! Per-developer stats merged from contributor stats, pull request
//! authorship and review activity.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::join;
use ghdash_core::{
    CacheDomain, DevStatsPayload, DeveloperStats, DomainFetcher, FetchError, FetchOutcome,
    ResourceKey,
};

use super::{list_pulls, reviews_for, to_payload, RawContributor, RawPull, RawReview, REVIEW_CONCURRENCY};
use crate::client::GithubClient;
use crate::retry::RetryPolicy;
use crate::transport::Endpoint;

/// Pull requests counted for authorship.
const PR_LIMIT: usize = 500;

/// Most recent pull requests whose reviews are counted.
const REVIEWED_PR_LIMIT: usize = 100;

pub struct DevStatsFetcher {
    client: GithubClient,
}

impl DevStatsFetcher {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DomainFetcher for DevStatsFetcher {
    fn domain(&self) -> CacheDomain {
        CacheDomain::DevStats
    }

    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError> {
        let contributors_endpoint = Endpoint::repo(key, "stats/contributors");
        let (contributors, pulls) = join!(
            self.client.stats_as::<Vec<RawContributor>>(
                &contributors_endpoint,
                Some(RetryPolicy::contributors())
            ),
            list_pulls(&self.client, key, PR_LIMIT),
        );
        let (contributors, pulls) = (contributors?, pulls?);

        if contributors.is_none() && pulls.is_none() {
            tracing::warn!(%key, "No developer stats from upstream");
            return Ok(FetchOutcome::NoData);
        }
        let contributors = contributors.unwrap_or_default();
        let pulls = pulls.unwrap_or_default();

        let reviewed: Vec<u64> = pulls.iter().take(REVIEWED_PR_LIMIT).map(|p| p.number).collect();
        let reviews = reviews_for(&self.client, key, reviewed, REVIEW_CONCURRENCY).await?;

        let stats = merge(&contributors, &pulls, reviews.iter().flatten());
        tracing::debug!(%key, developers = stats.len(), "Computed developer stats");
        Ok(FetchOutcome::Data(to_payload(CacheDomain::DevStats, &stats)?))
    }
}

fn merge<'a>(
    contributors: &[RawContributor],
    pulls: &[RawPull],
    reviews: impl Iterator<Item = &'a RawReview>,
) -> DevStatsPayload {
    let mut developers: BTreeMap<String, DeveloperStats> = BTreeMap::new();

    fn entry<'m>(
        developers: &'m mut BTreeMap<String, DeveloperStats>,
        login: &str,
        avatar_url: Option<&String>,
    ) -> &'m mut DeveloperStats {
        let dev = developers
            .entry(login.to_string())
            .or_insert_with(|| DeveloperStats::new(login));
        if dev.avatar_url.as_deref().map_or(true, str::is_empty) {
            dev.avatar_url = avatar_url.filter(|url| !url.is_empty()).cloned();
        }
        dev
    }

    for contributor in contributors {
        let Some(author) = &contributor.author else { continue };
        let Some(login) = author.login.as_deref().filter(|l| !l.is_empty()) else {
            continue;
        };
        let dev = entry(&mut developers, login, author.avatar_url.as_ref());
        dev.commits = contributor.total;
        dev.lines_added = contributor.weeks.iter().map(|w| w.a).sum();
        dev.lines_deleted = contributor.weeks.iter().map(|w| w.d).sum();
    }

    for pull in pulls {
        let Some(author) = pull.author() else { continue };
        let Some(login) = author.login.as_deref().filter(|l| !l.is_empty()) else {
            continue;
        };
        let dev = entry(&mut developers, login, author.avatar_url.as_ref());
        dev.prs_authored += 1;
        match pull.lifecycle_state() {
            "merged" => dev.prs_merged += 1,
            "closed" => dev.prs_closed += 1,
            _ => dev.prs_open += 1,
        }
    }

    for review in reviews {
        let Some(user) = &review.user else { continue };
        let Some(login) = user.login.as_deref().filter(|l| !l.is_empty()) else {
            continue;
        };
        let dev = entry(&mut developers, login, user.avatar_url.as_ref());
        dev.reviews_given += 1;
        match review.state.to_ascii_uppercase().as_str() {
            "APPROVED" => dev.approvals += 1,
            "CHANGES_REQUESTED" => dev.changes_requested += 1,
            "COMMENTED" => dev.comments += 1,
            _ => {}
        }
    }

    let mut stats: Vec<_> = developers.into_values().collect();
    stats.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.login.cmp(&b.login)));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InstantSleeper, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn key() -> ResourceKey {
        "acme/widgets".parse().expect("key")
    }

    fn client(transport: Arc<ScriptedTransport>) -> (GithubClient, Arc<InstantSleeper>) {
        let sleeper = Arc::new(InstantSleeper::new());
        (
            GithubClient::new(transport).with_sleeper(sleeper.clone()),
            sleeper,
        )
    }

    #[tokio::test]
    async fn test_merges_three_sources_sorted_by_commits() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(
            "repos/acme/widgets/stats/contributors",
            json!([
                { "author": { "login": "alice", "avatar_url": "a.png" }, "total": 5,
                  "weeks": [{ "w": 0, "a": 10, "d": 2, "c": 3 }, { "w": 1, "a": 5, "d": 1, "c": 2 }] },
                { "author": { "login": "bob" }, "total": 9, "weeks": [] },
                { "author": null, "total": 100, "weeks": [] }
            ]),
        );
        transport.push_json(
            "repos/acme/widgets/pulls?state=all&per_page=100&page=1",
            json!([
                { "number": 2, "state": "open", "user": { "login": "alice" } },
                { "number": 1, "state": "closed", "merged_at": "2024-01-01T00:00:00Z",
                  "user": { "login": "carol", "avatar_url": "c.png" } }
            ]),
        );
        transport.push_json(
            "repos/acme/widgets/pulls/2/reviews?per_page=100",
            json!([
                { "user": { "login": "bob" }, "state": "APPROVED" },
                { "user": { "login": "bob" }, "state": "COMMENTED" }
            ]),
        );
        transport.push_json(
            "repos/acme/widgets/pulls/1/reviews?per_page=100",
            json!([{ "user": { "login": "alice" }, "state": "CHANGES_REQUESTED" }]),
        );
        let (client, _) = client(transport);

        let value = DevStatsFetcher::new(client)
            .fetch(&key())
            .await
            .expect("fetch")
            .into_data()
            .expect("data");
        let stats: DevStatsPayload = serde_json::from_value(value).expect("decode");

        let logins: Vec<_> = stats.iter().map(|d| d.login.as_str()).collect();
        assert_eq!(logins, vec!["bob", "alice", "carol"]);

        let alice = &stats[1];
        assert_eq!(alice.commits, 5);
        assert_eq!(alice.lines_added, 15);
        assert_eq!(alice.lines_deleted, 3);
        assert_eq!(alice.prs_authored, 1);
        assert_eq!(alice.prs_open, 1);
        assert_eq!(alice.changes_requested, 1);
        assert_eq!(alice.avatar_url.as_deref(), Some("a.png"));

        let bob = &stats[0];
        assert_eq!(bob.reviews_given, 2);
        assert_eq!(bob.approvals, 1);
        assert_eq!(bob.comments, 1);

        let carol = &stats[2];
        assert_eq!(carol.prs_merged, 1);
        assert_eq!(carol.avatar_url.as_deref(), Some("c.png"));
    }

    #[tokio::test]
    async fn test_contributors_use_longer_retry_policy() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_pending("repos/acme/widgets/stats/contributors");
        transport.push_json("repos/acme/widgets/pulls?state=all&per_page=100&page=1", json!([]));
        let (client, sleeper) = client(transport.clone());

        let outcome = DevStatsFetcher::new(client).fetch(&key()).await.expect("fetch");

        assert_eq!(outcome, FetchOutcome::Data(json!([])));
        assert_eq!(transport.calls_to("repos/acme/widgets/stats/contributors"), 5);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(3); 4]);
    }

    #[tokio::test]
    async fn test_all_sources_empty_is_no_data() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_pending("repos/acme/widgets/stats/contributors");
        let (client, _) = client(transport);

        assert_eq!(
            DevStatsFetcher::new(client).fetch(&key()).await,
            Ok(FetchOutcome::NoData)
        );
    }
}
