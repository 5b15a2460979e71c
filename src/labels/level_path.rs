use serde::{Deserialize, Serialize};
use std::fmt;

/// Hierarchical classification of a screen, outermost segment first
/// (e.g. section, then subsection).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelPath {
    segments: Vec<String>,
}

impl LevelPath {
    pub fn new<S: Into<String>, I: IntoIterator<Item = S>>(segments: I) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Effective path of a child: parent segments first, then the child's.
    pub fn concat(parent: &LevelPath, child: &LevelPath) -> LevelPath {
        let mut segments = Vec::with_capacity(parent.len() + child.len());
        segments.extend(parent.segments.iter().cloned());
        segments.extend(child.segments.iter().cloned());
        LevelPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LevelPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for LevelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(" > "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_parent_first() {
        let parent = LevelPath::new(["news", "world"]);
        let child = LevelPath::new(["europe"]);
        let path = LevelPath::concat(&parent, &child);
        assert_eq!(path.segments(), ["news", "world", "europe"]);
        assert_eq!(path.to_string(), "news > world > europe");
    }

    #[test]
    fn test_concat_with_empty() {
        let path = LevelPath::new(["a"]);
        assert_eq!(LevelPath::concat(&LevelPath::empty(), &path), path);
        assert_eq!(LevelPath::concat(&path, &LevelPath::empty()), path);
    }
}
