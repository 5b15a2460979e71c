//! Canonical tracking events handed to sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::labels::{LabelSet, LevelPath};
use crate::trackable::UnitId;

/// Identity of one continuous fully-visible interval of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppearanceToken(Uuid);

impl AppearanceToken {
    pub(crate) fn issue() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AppearanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved page view. Built once per appearance and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageViewEvent {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub levels: LevelPath,
    pub labels: LabelSet,
    pub from_push_notification: bool,
    /// Emitting unit; `None` for manual page views.
    pub unit: Option<UnitId>,
    pub token: Option<AppearanceToken>,
    /// Monotonic per tracker.
    pub sequence: u64,
    /// Monotonic offset from tracker start.
    pub emitted_at: Duration,
    pub recorded_at: DateTime<Utc>,
}

/// Named user action, outside the page view lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    pub name: String,
    pub labels: LabelSet,
    pub recorded_at: DateTime<Utc>,
}

impl CustomEvent {
    pub fn new(name: impl Into<String>, labels: LabelSet) -> Self {
        Self {
            name: name.into(),
            labels,
            recorded_at: Utc::now(),
        }
    }
}
