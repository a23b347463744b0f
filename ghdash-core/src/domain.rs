//! Cache domains

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The independent data domains that share the stale-while-revalidate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    /// CI workflow runs
    Workflow,
    /// Per-developer commit, PR and review statistics
    DevStats,
    /// Per-contributor weekly commit series
    ContributorSeries,
    /// Code frequency and commit activity histograms
    CodeActivity,
    /// Pull request lifecycle and review timing
    Lifecycle,
}

impl CacheDomain {
    /// All domains, in storage tag order.
    pub const ALL: [CacheDomain; 5] = [
        CacheDomain::Workflow,
        CacheDomain::DevStats,
        CacheDomain::ContributorSeries,
        CacheDomain::CodeActivity,
        CacheDomain::Lifecycle,
    ];

    /// Stable name used in logs, metrics labels and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDomain::Workflow => "workflow",
            CacheDomain::DevStats => "dev_stats",
            CacheDomain::ContributorSeries => "contributor_series",
            CacheDomain::CodeActivity => "code_activity",
            CacheDomain::Lifecycle => "lifecycle",
        }
    }

    /// One-byte tag prefixed to every storage key of this domain.
    ///
    /// Tags are persisted on disk; never renumber them.
    pub fn tag(&self) -> u8 {
        match self {
            CacheDomain::Workflow => 0x01,
            CacheDomain::DevStats => 0x02,
            CacheDomain::ContributorSeries => 0x03,
            CacheDomain::CodeActivity => 0x04,
            CacheDomain::Lifecycle => 0x05,
        }
    }

    /// Inverse of [`CacheDomain::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.tag() == tag)
    }

    /// Default time-to-live before an entry counts as stale.
    pub fn default_ttl(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        match self {
            CacheDomain::Workflow => Duration::from_secs(60 * MINUTE),
            CacheDomain::DevStats => Duration::from_secs(4 * HOUR),
            CacheDomain::ContributorSeries => Duration::from_secs(24 * HOUR),
            CacheDomain::CodeActivity => Duration::from_secs(24 * HOUR),
            CacheDomain::Lifecycle => Duration::from_secs(2 * HOUR),
        }
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CacheDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("Unknown cache domain: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_unique_and_round_trip() {
        for domain in CacheDomain::ALL {
            assert_eq!(CacheDomain::from_tag(domain.tag()), Some(domain));
        }
        assert_eq!(CacheDomain::from_tag(0x00), None);
        assert_eq!(CacheDomain::from_tag(0xFF), None);
    }

    #[test]
    fn test_names_parse_back() {
        for domain in CacheDomain::ALL {
            assert_eq!(domain.as_str().parse::<CacheDomain>(), Ok(domain));
        }
        assert!("workflows".parse::<CacheDomain>().is_err());
    }

    #[test]
    fn test_default_ttls() {
        assert_eq!(CacheDomain::Workflow.default_ttl(), Duration::from_secs(3600));
        assert_eq!(CacheDomain::DevStats.default_ttl(), Duration::from_secs(4 * 3600));
        assert_eq!(
            CacheDomain::ContributorSeries.default_ttl(),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(
            CacheDomain::CodeActivity.default_ttl(),
            Duration::from_secs(24 * 3600)
        );
        assert_eq!(CacheDomain::Lifecycle.default_ttl(), Duration::from_secs(2 * 3600));
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&CacheDomain::ContributorSeries).unwrap_or_default();
        assert_eq!(json, "\"contributor_series\"");
    }
}
