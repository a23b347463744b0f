//! Domain-scoped storage keys.
//!
//! Every entry in the shared LMDB database is keyed by its domain first, so a
//! domain's keys form one contiguous range that `list_keys` and `clear` can
//! scan without touching other domains.

use ghdash_core::{CacheDomain, ResourceKey};

/// Separator byte between the domain tag and the resource key.
///
/// Never valid inside UTF-8, so it cannot collide with key bytes.
const SEPARATOR: u8 = 0xFF;

/// Storage key for one (domain, resource key) pair.
///
/// # Binary Format
///
/// - Byte 0: domain tag (see [`CacheDomain::tag`])
/// - Byte 1: separator (0xFF)
/// - Bytes 2..: resource key as UTF-8
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainKey {
    domain: CacheDomain,
    key: ResourceKey,
}

impl DomainKey {
    pub fn new(domain: CacheDomain, key: ResourceKey) -> Self {
        Self { domain, key }
    }

    pub fn domain(&self) -> CacheDomain {
        self.domain
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn into_key(self) -> ResourceKey {
        self.key
    }

    pub fn encode(&self) -> Vec<u8> {
        let key = self.key.as_str().as_bytes();
        let mut bytes = Vec::with_capacity(2 + key.len());
        bytes.extend_from_slice(&Self::domain_prefix(self.domain));
        bytes.extend_from_slice(key);
        bytes
    }

    /// Decode a stored key.
    ///
    /// Returns `None` for an unknown tag, a missing separator, or a key that
    /// no longer validates as a [`ResourceKey`].
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 || bytes[1] != SEPARATOR {
            return None;
        }
        let domain = CacheDomain::from_tag(bytes[0])?;
        let key = std::str::from_utf8(&bytes[2..]).ok()?.parse().ok()?;
        Some(Self { domain, key })
    }

    /// Prefix shared by every key of `domain`.
    pub fn domain_prefix(domain: CacheDomain) -> [u8; 2] {
        [domain.tag(), SEPARATOR]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(s: &str) -> ResourceKey {
        s.parse().expect("test key should parse")
    }

    #[test]
    fn test_encode_layout() {
        let encoded = DomainKey::new(CacheDomain::Lifecycle, key("acme/widgets")).encode();
        assert_eq!(encoded[0], CacheDomain::Lifecycle.tag());
        assert_eq!(encoded[1], SEPARATOR);
        assert_eq!(&encoded[2..], b"acme/widgets");
    }

    #[test]
    fn test_prefix_isolates_domains() {
        let workflow = DomainKey::new(CacheDomain::Workflow, key("acme/widgets")).encode();
        let stats = DomainKey::new(CacheDomain::DevStats, key("acme/widgets")).encode();
        assert!(workflow.starts_with(&DomainKey::domain_prefix(CacheDomain::Workflow)));
        assert!(!stats.starts_with(&DomainKey::domain_prefix(CacheDomain::Workflow)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(DomainKey::decode(&[]), None);
        assert_eq!(DomainKey::decode(&[0x01, 0xFF]), None);
        assert_eq!(DomainKey::decode(&[0x01, 0x00, b'a', b'/', b'b']), None);
        assert_eq!(DomainKey::decode(&[0x7F, 0xFF, b'a', b'/', b'b']), None);
        assert_eq!(DomainKey::decode(&[0x01, 0xFF, b'n', b'o']), None);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            tag_index in 0usize..5,
            owner in "[A-Za-z0-9_.-]{1,16}",
            repo in "[A-Za-z0-9_.-]{1,32}",
        ) {
            let domain = CacheDomain::ALL[tag_index];
            let original = DomainKey::new(domain, ResourceKey::new(&owner, &repo).expect("valid"));
            prop_assert_eq!(DomainKey::decode(&original.encode()), Some(original));
        }
    }
}
