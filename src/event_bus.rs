//! Tracker Event Bus
//!
//! Broadcasts what the tracker sends so that test suites can assert on
//! measurements without talking to a real backend. Only populated when the
//! tracker runs with `unit_testing` enabled.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::dispatch::SinkFailure;
use crate::event::{CustomEvent, PageViewEvent};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Notifications published by the dispatch worker.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum TrackerEvent {
    /// A page view went through the sinks
    PageViewSent {
        event: Arc<PageViewEvent>,
        failures: Vec<SinkFailure>,
    },
    /// A custom event went through the sinks
    CustomEventSent {
        event: Arc<CustomEvent>,
        failures: Vec<SinkFailure>,
    },
}

pub struct EventBus {
    tx: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to all current subscribers; dropped if nobody listens.
    pub fn publish(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
