//! Trackable Unit Abstraction
//!
//! Any screen, or any fragment embedded in a screen, that wants to be
//! measured implements [`Trackable`]. Implementors are plain data producers
//! and carry no knowledge of the host UI toolkit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::labels::{LabelSet, LevelPath};

/// Event kind used when a declaration does not name one.
pub const DEFAULT_PAGE_VIEW_TYPE: &str = "page_view";

/// Opaque identity of one trackable unit instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(u64);

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

impl UnitId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// What a trackable unit says about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackableDeclaration {
    pub title: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub levels: Option<LevelPath>,
    #[serde(default)]
    pub labels: Option<LabelSet>,
    /// The screen was opened in response to a push notification.
    #[serde(default)]
    pub from_push_notification: bool,
    /// When false, appearance alone never emits; the owner calls
    /// `Tracker::track_unit` once its data is ready.
    #[serde(default = "default_tracked_automatically")]
    pub tracked_automatically: bool,
}

fn default_tracked_automatically() -> bool {
    true
}

impl TrackableDeclaration {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: None,
            levels: None,
            labels: None,
            from_push_notification: false,
            tracked_automatically: true,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_levels(mut self, levels: LevelPath) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn from_push_notification(mut self, from_push: bool) -> Self {
        self.from_push_notification = from_push;
        self
    }

    pub fn manual(mut self) -> Self {
        self.tracked_automatically = false;
        self
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

/// Capability of a screen or fragment to declare tracking context.
///
/// `declare` runs synchronously inside the appearance transition. It must be
/// pure, cheap and return the same value for the whole appearance; anything
/// asynchronous has to be resolved before the unit becomes visible.
pub trait Trackable: Send + Sync {
    fn declare(&self) -> TrackableDeclaration;
}

/// A unit whose declaration is fixed at construction, e.g. a view modifier
/// marking a plain view as tracked.
#[derive(Debug, Clone)]
pub struct StaticTrackable {
    declaration: TrackableDeclaration,
}

impl StaticTrackable {
    pub fn new(declaration: TrackableDeclaration) -> Self {
        Self { declaration }
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self::new(TrackableDeclaration::new(title))
    }
}

impl Trackable for StaticTrackable {
    fn declare(&self) -> TrackableDeclaration {
        self.declaration.clone()
    }
}

impl<F> Trackable for F
where
    F: Fn() -> TrackableDeclaration + Send + Sync,
{
    fn declare(&self) -> TrackableDeclaration {
        self()
    }
}
