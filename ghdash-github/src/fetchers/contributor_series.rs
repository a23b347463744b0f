//! Weekly per-contributor series from `stats/contributors`.

use async_trait::async_trait;
use ghdash_core::{
    CacheDomain, ContributorSeries, ContributorSeriesPayload, DomainFetcher, FetchError,
    FetchOutcome, ResourceKey, WeekPoint,
};

use super::{to_payload, week_label, RawContributor};
use crate::client::GithubClient;
use crate::transport::Endpoint;

pub struct ContributorSeriesFetcher {
    client: GithubClient,
}

impl ContributorSeriesFetcher {
    pub fn new(client: GithubClient) -> Self {
        Self { client }
    }
}

impl From<RawContributor> for ContributorSeries {
    fn from(raw: RawContributor) -> Self {
        let author = raw.author.unwrap_or_default();
        ContributorSeries {
            login: author.login.unwrap_or_else(|| "unknown".to_string()),
            avatar_url: author.avatar_url,
            total: raw.total,
            weeks: raw
                .weeks
                .into_iter()
                .map(|w| WeekPoint {
                    week: week_label(w.w),
                    commits: w.c,
                    additions: w.a,
                    deletions: w.d,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl DomainFetcher for ContributorSeriesFetcher {
    fn domain(&self) -> CacheDomain {
        CacheDomain::ContributorSeries
    }

    async fn fetch(&self, key: &ResourceKey) -> Result<FetchOutcome, FetchError> {
        let endpoint = Endpoint::repo(key, "stats/contributors");
        let Some(raw) = self
            .client
            .stats_as::<Vec<RawContributor>>(&endpoint, None)
            .await?
        else {
            return Ok(FetchOutcome::NoData);
        };

        let mut series: ContributorSeriesPayload =
            raw.into_iter().map(ContributorSeries::from).collect();
        series.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.login.cmp(&b.login)));

        Ok(FetchOutcome::Data(to_payload(
            CacheDomain::ContributorSeries,
            &series,
        )?))
    }
}
