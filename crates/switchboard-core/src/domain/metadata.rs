//! MetaData - メッセージに付随する不変のキー・値マップ
//!
//! すべての変更系メソッドは新しいインスタンスを返します（copy-on-write）。
//! 空の MetaData は `MetaData::EMPTY` 定数で、同期なしに共有できます。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable, key-ordered metadata attached to a message.
///
/// Cloning is cheap: the entries are shared behind an `Arc`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct MetaData {
    entries: Option<Arc<BTreeMap<String, Value>>>,
}

impl MetaData {
    /// The shared empty instance.
    pub const EMPTY: MetaData = MetaData { entries: None };

    fn from_map(map: BTreeMap<String, Value>) -> Self {
        if map.is_empty() {
            Self::EMPTY
        } else {
            Self {
                entries: Some(Arc::new(map)),
            }
        }
    }

    /// MetaData with a single entry.
    pub fn with(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::EMPTY.and(key, value)
    }

    /// A copy of this metadata with `key` set to `value`.
    pub fn and(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = self.to_map();
        map.insert(key.into(), value.into());
        Self::from_map(map)
    }

    /// A copy of this metadata without `key`.
    pub fn without(&self, key: &str) -> Self {
        if !self.contains_key(key) {
            return self.clone();
        }
        let mut map = self.to_map();
        map.remove(key);
        Self::from_map(map)
    }

    /// Entries of `other` win; keys only present here are kept.
    pub fn merged_with(&self, other: &MetaData) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut map = self.to_map();
        for (key, value) in other.iter() {
            map.insert(key.clone(), value.clone());
        }
        Self::from_map(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.as_ref().and_then(|entries| entries.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().flat_map(|entries| entries.iter())
    }

    fn to_map(&self) -> BTreeMap<String, Value> {
        self.entries
            .as_ref()
            .map(|entries| (**entries).clone())
            .unwrap_or_default()
    }
}

impl PartialEq for MetaData {
    fn eq(&self, other: &Self) -> bool {
        match (&self.entries, &other.entries) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for MetaData {}

impl From<BTreeMap<String, Value>> for MetaData {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl From<MetaData> for BTreeMap<String, Value> {
    fn from(metadata: MetaData) -> Self {
        metadata.to_map()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MetaData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_is_shared_constant() {
        assert!(MetaData::EMPTY.is_empty());
        assert_eq!(MetaData::default(), MetaData::EMPTY);
        assert_eq!(MetaData::from_iter(Vec::<(String, Value)>::new()), MetaData::EMPTY);
    }

    #[test]
    fn and_returns_new_instance() {
        let original = MetaData::with("trace", "abc");
        let extended = original.and("user", 42);

        assert_eq!(original.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended.get("user"), Some(&json!(42)));
        assert!(original.get("user").is_none());
    }

    #[test]
    fn merged_with_prefers_other_entries() {
        let base = MetaData::from_iter([("a", json!(1)), ("b", json!(2))]);
        let extra = MetaData::from_iter([("b", json!(20)), ("c", json!(30))]);

        let merged = base.merged_with(&extra);
        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(20)));
        assert_eq!(merged.get("c"), Some(&json!(30)));

        assert_eq!(MetaData::EMPTY.merged_with(&extra), extra);
        assert_eq!(base.merged_with(&MetaData::EMPTY), base);
    }

    #[test]
    fn without_drops_key() {
        let metadata = MetaData::from_iter([("a", 1), ("b", 2)]);
        let trimmed = metadata.without("a");
        assert!(!trimmed.contains_key("a"));
        assert_eq!(trimmed.len(), 1);
        assert_eq!(metadata.without("missing"), metadata);
        assert_eq!(MetaData::with("a", 1).without("a"), MetaData::EMPTY);
    }

    #[test]
    fn iteration_is_key_ordered() {
        let metadata = MetaData::from_iter([("z", 1), ("a", 2), ("m", 3)]);
        let keys: Vec<&str> = metadata.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "m", "z"]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let metadata = MetaData::from_iter([("a", 1)]);
        let s = serde_json::to_string(&metadata).unwrap();
        assert_eq!(s, r#"{"a":1}"#);
        let back: MetaData = serde_json::from_str(&s).unwrap();
        assert_eq!(back, metadata);
    }
}
