//! Resource keys (`owner/repo`)

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;

static SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Invalid key segment regex"));

/// Identifier of a cached resource within one domain, e.g. `acme/widgets`.
///
/// Construction validates the shape, so a `ResourceKey` can always be split
/// into owner and repo and safely interpolated into upstream endpoint paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Build a key from its two halves.
    pub fn new(owner: &str, repo: &str) -> Result<Self, KeyError> {
        format!("{}/{}", owner, repo).parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn owner(&self) -> &str {
        self.split().0
    }

    pub fn repo(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        // Validated on construction: exactly one '/'.
        self.0.split_once('/').unwrap_or((self.0.as_str(), ""))
    }
}

impl FromStr for ResourceKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyError::Empty);
        }
        let (owner, repo) = s.split_once('/').ok_or_else(|| KeyError::Malformed {
            key: s.to_string(),
        })?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(KeyError::Malformed { key: s.to_string() });
        }
        if !SEGMENT.is_match(owner) {
            return Err(KeyError::InvalidCharacter {
                part: "owner",
                key: s.to_string(),
            });
        }
        if !SEGMENT.is_match(repo) {
            return Err(KeyError::InvalidCharacter {
                part: "repo",
                key: s.to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
