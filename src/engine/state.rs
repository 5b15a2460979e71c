use std::sync::Arc;

use crate::event::{AppearanceToken, PageViewEvent};
use crate::trackable::{Trackable, UnitId};

/// Per-unit appearance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Visible {
        token: AppearanceToken,
        /// The page view for this token went out, or was suppressed.
        settled: bool,
    },
}

impl UnitState {
    pub fn is_visible(&self) -> bool {
        matches!(self, UnitState::Visible { .. })
    }

    pub fn token(&self) -> Option<AppearanceToken> {
        match self {
            UnitState::Visible { token, .. } => Some(*token),
            UnitState::Idle => None,
        }
    }
}

pub(crate) struct RegisteredUnit {
    pub unit: Arc<dyn Trackable>,
    pub parent: Option<UnitId>,
    pub state: UnitState,
    pub last_event: Option<Arc<PageViewEvent>>,
}

impl RegisteredUnit {
    pub fn new(unit: Arc<dyn Trackable>, parent: Option<UnitId>) -> Self {
        Self {
            unit,
            parent,
            state: UnitState::Idle,
            last_event: None,
        }
    }
}
