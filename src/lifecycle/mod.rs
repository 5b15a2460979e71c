//! Appearance Lifecycle
//!
//! Normalized lifecycle signals consumed by the page view engine, and the
//! observer that derives them from raw host UI transitions.

mod observer;

pub use observer::{AppearanceObserver, HostTransition};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::trackable::UnitId;

/// Lifecycle signal scoped to one unit or to the whole host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "signal", content = "unit", rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// The unit is topmost, unobscured and fully presented.
    BecameVisible(UnitId),
    /// The unit left the fully visible state.
    BecameHidden(UnitId),
    HostForegrounded,
    HostBackgrounded,
}

impl LifecycleSignal {
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            LifecycleSignal::BecameVisible(id) | LifecycleSignal::BecameHidden(id) => Some(*id),
            LifecycleSignal::HostForegrounded | LifecycleSignal::HostBackgrounded => None,
        }
    }
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleSignal::BecameVisible(id) => write!(f, "becameVisible({})", id),
            LifecycleSignal::BecameHidden(id) => write!(f, "becameHidden({})", id),
            LifecycleSignal::HostForegrounded => write!(f, "hostForegrounded"),
            LifecycleSignal::HostBackgrounded => write!(f, "hostBackgrounded"),
        }
    }
}
