//! Pull request lifecycle: a sample of recent pull requests, each with its
//! full review history and first review.

use async_trait::async_trait;
use ghdash_core::{
    CacheDomain, DomainFetcher, FetchError, FetchOutcome, LifecyclePayload, PullRequestLifecycle,
    ResourceKey, Review,
};

use super::{list_pulls, reviews_for, to_payload, RawPull, RawReview, REVIEW_CONCURRENCY};
use crate::client::GithubClient;

pub struct LifecycleFetcher {
    client: GithubClient,
    sample_limit: usize,
}

impl LifecycleFetcher {
    pub fn new(client: GithubClient, sample_limit: usize) -> Self {
        Self {
            client,
            sample_limit: sample_limit.max(1),
        }
    }
}

fn lifecycle(pull: RawPull, reviews: Vec<RawReview>) -> PullRequestLifecycle {
    let all_reviews: Vec<Review> = reviews
        .into_iter()
        .map(|r| Review {
            login: r.user.and_then(|u| u.login),
            submitted_at: r.submitted_at,
            state: r.state,
        })
        .collect();

    // Upstream lists reviews oldest first; pending reviews have no timestamp.
    let first = all_reviews.iter().find(|r| r.submitted_at.is_some());

    PullRequestLifecycle {
        number: pull.number,
        state: pull.lifecycle_state().to_string(),
        author: pull.author().and_then(|u| u.login.clone()),
        title: pull.title,
        created_at: pull.created_at,
        merged_at: pull.merged_at,
        closed_at: pull.closed_at,
        updated_at: pull.updated_at,
        first_review_at: first.and_then(|r| r.submitted_at),
        first_reviewer: first.and_then(|r| r.login.clone()),
        all_reviews,
    }
}

#[async_trait]
impl DomainFetcher for LifecycleFetcher {
    fn domain(&self) -> CacheDomain {
        CacheDomain::Lifecycle
    }

    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError> {
        // An empty page is a repository without pull requests, not a miss.
        let Some(pulls) = list_pulls(&self.client, key, self.sample_limit).await? else {
            return Ok(FetchOutcome::NoData);
        };

        let numbers: Vec<u64> = pulls.iter().map(|p| p.number).collect();
        let reviews = reviews_for(&self.client, key, numbers, REVIEW_CONCURRENCY).await?;

        let payload: LifecyclePayload = pulls
            .into_iter()
            .zip(reviews)
            .map(|(pull, reviews)| lifecycle(pull, reviews))
            .collect();
        tracing::debug!(%key, pulls = payload.len(), "Fetched pull request lifecycle");

        Ok(FetchOutcome::Data(to_payload(CacheDomain::Lifecycle, &payload)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use ghdash_core::TransportError;
    use serde_json::json;
    use std::sync::Arc;

    fn key() -> ResourceKey {
        "acme/widgets".parse().expect("key")
    }

    #[tokio::test]
    async fn test_pulls_carry_reviews_and_first_review() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(
            "repos/acme/widgets/pulls?state=all&per_page=100&page=1",
            json!([
                { "number": 11, "title": "Add cache", "state": "closed",
                  "merged_at": "2024-03-02T00:00:00Z", "created_at": "2024-03-01T00:00:00Z",
                  "user": { "login": "alice" } },
                { "number": 12, "title": "WIP", "state": "open", "user": { "login": "bob" } }
            ]),
        );
        transport.push_json(
            "repos/acme/widgets/pulls/11/reviews?per_page=100",
            json!([
                { "user": { "login": "pending" }, "state": "PENDING" },
                { "user": { "login": "carol" }, "state": "APPROVED", "submitted_at": "2024-03-01T06:00:00Z" }
            ]),
        );
        transport.push_json("repos/acme/widgets/pulls/12/reviews?per_page=100", json!([]));
        let fetcher = LifecycleFetcher::new(GithubClient::new(transport), 250);

        let value = fetcher
            .fetch(&key())
            .await
            .expect("fetch")
            .into_data()
            .expect("data");
        let pulls: LifecyclePayload = serde_json::from_value(value).expect("decode");

        assert_eq!(pulls.len(), 2);
        assert_eq!(pulls[0].state, "merged");
        assert_eq!(pulls[0].author.as_deref(), Some("alice"));
        assert_eq!(pulls[0].all_reviews.len(), 2);
        assert_eq!(pulls[0].first_reviewer.as_deref(), Some("carol"));
        assert!(pulls[0].first_review_at.is_some());
        assert_eq!(pulls[1].state, "open");
        assert!(pulls[1].all_reviews.is_empty());
        assert_eq!(pulls[1].first_reviewer, None);
    }

    #[tokio::test]
    async fn test_repository_without_pulls_is_still_data() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json("repos/acme/widgets/pulls?state=all&per_page=100&page=1", json!([]));
        let fetcher = LifecycleFetcher::new(GithubClient::new(transport), 250);

        assert_eq!(
            fetcher.fetch(&key()).await,
            Ok(FetchOutcome::Data(json!([])))
        );
    }

    #[tokio::test]
    async fn test_failed_pull_listing_is_no_data() {
        // Unscripted paths answer 404.
        let transport = Arc::new(ScriptedTransport::new());
        let fetcher = LifecycleFetcher::new(GithubClient::new(transport), 250);

        assert_eq!(fetcher.fetch(&key()).await, Ok(FetchOutcome::NoData));
    }

    #[tokio::test]
    async fn test_unavailable_transport_is_an_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_error(
            "repos/acme/widgets/pulls?state=all&per_page=100&page=1",
            TransportError::Unavailable {
                reason: "gh not found".to_string(),
            },
        );
        let fetcher = LifecycleFetcher::new(GithubClient::new(transport), 250);

        let err = fetcher.fetch(&key()).await.expect_err("should fail");
        assert!(matches!(err, FetchError::Transport(TransportError::Unavailable { .. })));
    }
}
