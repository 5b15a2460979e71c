//! Label & Context Model
//!
//! Immutable key-value bags (labels) and hierarchical classification paths
//! (levels) attached to trackable units. Both are plain values and can be
//! shared freely across threads.

mod label_set;
mod level_path;

pub use label_set::LabelSet;
pub use level_path::LevelPath;

/// Labels applied beneath every page view, e.g. application-wide context.
pub trait GlobalLabelsSource: Send + Sync {
    fn global_labels(&self) -> LabelSet;
}

impl GlobalLabelsSource for LabelSet {
    fn global_labels(&self) -> LabelSet {
        self.clone()
    }
}
