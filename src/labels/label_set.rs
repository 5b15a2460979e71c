use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered mapping of label keys to values with unique keys.
///
/// Insertion order is kept so that resolved labels are reported to sinks in
/// a stable order. Once built a `LabelSet` is never mutated; `merge` and
/// `with` return new sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct LabelSet {
    entries: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from pairs. A repeated key keeps its first position and
    /// takes the last value.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Self { entries }
    }

    /// Returns a copy of this set with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::merge(self, &Self::from_pairs([(key.into(), value.into())]))
    }

    /// Merge `override_set` over `base`.
    ///
    /// Keys of `base` come first in their original order (taking the override
    /// value on collision), then keys only present in `override_set` in theirs.
    pub fn merge(base: &LabelSet, override_set: &LabelSet) -> LabelSet {
        let mut entries = Vec::with_capacity(base.len() + override_set.len());
        for (key, value) in &base.entries {
            let value = override_set.get(key).unwrap_or(value.as_str());
            entries.push((key.clone(), value.to_string()));
        }
        for (key, value) in &override_set.entries {
            if !base.contains_key(key) {
                entries.push((key.clone(), value.clone()));
            }
        }
        LabelSet { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Vec<(String, String)>> for LabelSet {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::from_pairs(pairs)
    }
}

impl From<LabelSet> for Vec<(String, String)> {
    fn from(set: LabelSet) -> Self {
        set.entries
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}
