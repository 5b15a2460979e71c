//! Screen Analytics
//!
//! Page view tracking core for applications with screen-based UIs:
//! - Hierarchical tracking context (levels and labels) with explicit merging
//! - Appearance lifecycle normalization (visible, hidden, background, foreground)
//! - Exactly one page view per appearance, whatever the host UI reports
//! - Fan-out to any number of analytics backends with isolated failures

pub mod config;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod event;
pub mod event_bus;
pub mod labels;
pub mod lifecycle;
pub mod telemetry;
pub mod trackable;
pub mod tracker;

// Re-exports for convenience
pub use config::{BusinessUnit, TrackerConfig};
pub use dispatch::{Dispatcher, Sink, SinkError};
pub use engine::{PageViewEngine, SignalOutcome, UnitState};
pub use event::{AppearanceToken, CustomEvent, PageViewEvent};
pub use labels::{LabelSet, LevelPath};
pub use lifecycle::{AppearanceObserver, HostTransition, LifecycleSignal};
pub use trackable::{Trackable, TrackableDeclaration, UnitId};
pub use tracker::{StartError, Tracker, TrackerBuilder};
