use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Sorted `key=value` pairs identifying one series of a metric.
///
/// Keys are unique; when the same key is given twice the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagSet {
    // SmallVec to avoid allocation for small tag sets (usually < 4)
    tags: SmallVec<[(Arc<str>, Arc<str>); 4]>,
}

impl TagSet {
    pub fn new<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let merged: BTreeMap<Arc<str>, Arc<str>> = pairs
            .into_iter()
            .map(|(k, v)| (Arc::from(k.as_ref()), Arc::from(v.as_ref())))
            .collect();

        Self {
            tags: merged.into_iter().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let idx = self.tags.partition_point(|(k, _)| k.as_ref() < key);
        self.tags
            .get(idx)
            .and_then(|(k, v)| (k.as_ref() == key).then_some(v.as_ref()))
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    /// Owned copy of the pairs, in key order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagset_sorts_keys_and_keeps_last_value() {
        let set = TagSet::new([("status", "fail"), ("check", "a"), ("status", "pass")]);
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![("check", "a"), ("status", "pass")]
        );
        assert_eq!(set.get("status"), Some("pass"));
        assert_eq!(set.get("missing"), None);
        assert!(set.contains("check", "a"));
        assert!(!set.contains("check", "b"));
    }

    #[test]
    fn tagsets_with_same_pairs_are_equal_regardless_of_order() {
        let a = TagSet::new([("a", "1"), ("b", "2")]);
        let b: TagSet = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(a, b);
        assert!(TagSet::empty().is_empty());
    }
}
