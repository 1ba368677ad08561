//! Secret entries and tag sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value tags attached to a secret.
///
/// Ordered so tag lists sent to the store are deterministic.
pub type TagSet = BTreeMap<String, String>;

/// A secret stored in the remote vault.
///
/// The payload is opaque binary (certificates, private keys, provisioning
/// profiles) and is never transcoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretEntry {
    /// Full remote key, including the path prefix
    pub remote_key: String,

    /// Raw secret bytes
    pub payload: Vec<u8>,

    /// Tags attached to the secret
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: TagSet,

    /// When the secret was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// When the payload was last replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

impl SecretEntry {
    /// Creates a new entry stamped with the current time.
    ///
    /// # Example
    ///
    /// ```
    /// use secretmatch::{SecretEntry, TagSet};
    ///
    /// let entry = SecretEntry::new("match/certs/dev.cer", vec![0x30, 0x82], TagSet::new());
    /// assert_eq!(entry.remote_key, "match/certs/dev.cer");
    /// assert_eq!(entry.payload, vec![0x30, 0x82]);
    /// ```
    pub fn new(remote_key: impl Into<String>, payload: Vec<u8>, tags: TagSet) -> Self {
        let now = Utc::now();
        Self {
            remote_key: remote_key.into(),
            payload,
            tags,
            created: Some(now),
            modified: Some(now),
        }
    }

    /// Replaces the payload, keeping tags untouched.
    pub fn replace_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
        self.modified = Some(Utc::now());
    }

    /// Merges `tags` into the entry. Existing keys are overwritten, none are removed.
    pub fn merge_tags(&mut self, tags: &TagSet) {
        self.tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Merges global tags with per-secret tags; per-secret values win on collision.
///
/// ```
/// use secretmatch::entry::merge_tags;
/// use secretmatch::TagSet;
///
/// let global = TagSet::from([("Team".into(), "ios".into()), ("Name".into(), "x".into())]);
/// let specific = TagSet::from([("Name".into(), "Alice".into())]);
///
/// let merged = merge_tags(&global, &specific);
/// assert_eq!(merged["Team"], "ios");
/// assert_eq!(merged["Name"], "Alice");
/// ```
pub fn merge_tags(global: &TagSet, specific: &TagSet) -> TagSet {
    let mut merged = global.clone();
    merged.extend(specific.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry() {
        let entry = SecretEntry::new("match/a.p12", b"bytes".to_vec(), TagSet::new());
        assert_eq!(entry.remote_key, "match/a.p12");
        assert!(entry.tags.is_empty());
        assert!(entry.created.is_some());
    }

    #[test]
    fn test_merge_tags_is_additive() {
        let mut entry = SecretEntry::new(
            "match/a.cer",
            Vec::new(),
            TagSet::from([("Team".to_string(), "ios".to_string())]),
        );
        entry.merge_tags(&TagSet::from([("Name".to_string(), "Alice".to_string())]));

        assert_eq!(entry.tags.len(), 2);
        assert_eq!(entry.tags["Team"], "ios");
    }

    #[test]
    fn test_replace_payload_keeps_tags() {
        let mut entry = SecretEntry::new(
            "match/a.cer",
            b"old".to_vec(),
            TagSet::from([("Name".to_string(), "Alice".to_string())]),
        );
        entry.replace_payload(b"new".to_vec());

        assert_eq!(entry.payload, b"new");
        assert_eq!(entry.tags["Name"], "Alice");
    }

    #[test]
    fn test_entry_serialization() {
        let entry = SecretEntry::new("match/a.cer", vec![0, 159, 255], TagSet::new());
        let json = serde_json::to_string(&entry).unwrap();
        let deserialized: SecretEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, deserialized);
    }
}
