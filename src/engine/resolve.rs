//! Context resolution across the logical parent chain.

use crate::labels::{LabelSet, LevelPath};
use crate::trackable::{TrackableDeclaration, DEFAULT_PAGE_VIEW_TYPE};

/// Declaration flattened over its ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDeclaration {
    pub title: String,
    pub kind: String,
    pub levels: LevelPath,
    pub labels: LabelSet,
    pub from_push_notification: bool,
}

/// Layer `chain` (outermost first, innermost last) over `base` labels.
///
/// Levels concatenate parent first and labels merge with the inner unit
/// winning. Title and push flag come from the innermost declaration; the
/// kind from the innermost declaration that names one.
pub fn resolve(base: &LabelSet, chain: &[TrackableDeclaration]) -> Option<ResolvedDeclaration> {
    let innermost = chain.last()?;

    let mut levels = LevelPath::empty();
    let mut labels = base.clone();
    let mut kind: Option<&str> = None;
    for declaration in chain {
        if let Some(own) = &declaration.levels {
            levels = LevelPath::concat(&levels, own);
        }
        if let Some(own) = &declaration.labels {
            labels = LabelSet::merge(&labels, own);
        }
        if let Some(own) = declaration.kind.as_deref().filter(|k| !k.is_empty()) {
            kind = Some(own);
        }
    }

    Some(ResolvedDeclaration {
        title: innermost.title.clone(),
        kind: kind.unwrap_or(DEFAULT_PAGE_VIEW_TYPE).to_string(),
        levels,
        labels,
        from_push_notification: innermost.from_push_notification,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_context_layers_over_parent() {
        let parent = TrackableDeclaration::new("Parent")
            .with_levels(LevelPath::new(["a"]))
            .with_labels(LabelSet::from_pairs([("x", "1")]));
        let child = TrackableDeclaration::new("Child")
            .with_levels(LevelPath::new(["b"]))
            .with_labels(LabelSet::from_pairs([("x", "2"), ("y", "3")]));

        let resolved = resolve(&LabelSet::new(), &[parent, child]).unwrap();

        assert_eq!(resolved.title, "Child");
        assert_eq!(resolved.levels, LevelPath::new(["a", "b"]));
        assert_eq!(resolved.labels, LabelSet::from_pairs([("x", "2"), ("y", "3")]));
        assert_eq!(resolved.kind, DEFAULT_PAGE_VIEW_TYPE);
    }

    #[test]
    fn test_kind_falls_back_to_nearest_declaring_ancestor() {
        let grandparent = TrackableDeclaration::new("G").with_kind("section");
        let parent = TrackableDeclaration::new("P").with_kind("audio");
        let child = TrackableDeclaration::new("C");

        let resolved = resolve(&LabelSet::new(), &[grandparent, parent, child]).unwrap();
        assert_eq!(resolved.kind, "audio");
    }

    #[test]
    fn test_base_labels_sit_underneath() {
        let base = LabelSet::from_pairs([("app", "demo"), ("x", "base")]);
        let unit = TrackableDeclaration::new("U").with_labels(LabelSet::from_pairs([("x", "unit")]));

        let resolved = resolve(&base, &[unit]).unwrap();
        assert_eq!(resolved.labels, LabelSet::from_pairs([("app", "demo"), ("x", "unit")]));
    }

    #[test]
    fn test_empty_chain_resolves_to_nothing() {
        assert!(resolve(&LabelSet::new(), &[]).is_none());
    }
}
