//! Background dispatch worker.
//!
//! The engine hands events over through an unbounded channel and never
//! waits on sinks. The worker drains the channel and fans each event out.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Dispatcher;
use crate::event::{CustomEvent, PageViewEvent};
use crate::event_bus::{EventBus, TrackerEvent};

/// Work item for the dispatch worker.
#[derive(Debug, Clone)]
pub enum Outbound {
    PageView(Arc<PageViewEvent>),
    Custom(Arc<CustomEvent>),
}

/// Cheap, cloneable sender side of the worker.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl DispatchHandle {
    /// Queue an event. Returns false once the worker has shut down.
    pub fn submit(&self, outbound: Outbound) -> bool {
        match self.tx.send(outbound) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dispatch worker gone, event dropped");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the worker on the current tokio runtime.
///
/// The worker exits once every [`DispatchHandle`] is dropped and the queue
/// is drained; the join handle yields the number of items it processed.
pub fn spawn_worker(
    dispatcher: Arc<Dispatcher>,
    bus: Option<Arc<EventBus>>,
) -> (DispatchHandle, JoinHandle<u64>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let task = tokio::spawn(async move {
        info!(sinks = ?dispatcher.sink_names(), "Dispatch worker started");
        let mut processed = 0u64;
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::PageView(event) => {
                    let report = dispatcher.dispatch(&event).await;
                    if let Some(bus) = &bus {
                        bus.publish(TrackerEvent::PageViewSent {
                            event,
                            failures: report.failures,
                        });
                    }
                }
                Outbound::Custom(event) => {
                    let report = dispatcher.dispatch_custom(&event).await;
                    if let Some(bus) = &bus {
                        bus.publish(TrackerEvent::CustomEventSent {
                            event,
                            failures: report.failures,
                        });
                    }
                }
            }
            processed += 1;
        }
        info!(processed, "Dispatch worker stopped");
        processed
    });

    (DispatchHandle { tx }, task)
}
