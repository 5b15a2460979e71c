//! Backend Fan-Out Dispatcher
//!
//! Delivers one immutable event to every configured sink, in order, with
//! failures isolated per sink. Retrying is left to the sinks themselves.

mod sinks;
mod worker;

pub use sinks::{LoggingSink, MemorySink};
pub use worker::{spawn_worker, DispatchHandle, Outbound};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::event::{CustomEvent, PageViewEvent};

/// A backend refused or failed to take an event.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum SinkError {
    #[error("event rejected: {0}")]
    Rejected(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("sink panicked while receiving")]
    Panicked,
    #[error("{0}")]
    Other(String),
}

/// External analytics backend.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs and dispatch reports.
    fn name(&self) -> String;

    async fn receive(&self, event: &PageViewEvent) -> Result<(), SinkError>;

    /// Custom (non page view) events. Sinks that do not measure them can
    /// keep the default.
    async fn receive_custom(&self, _event: &CustomEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkFailure {
    pub sink: String,
    pub error: SinkError,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failures: Vec<SinkFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered set of sinks.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Dispatcher {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver a page view to every sink in order.
    pub async fn dispatch(&self, event: &PageViewEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for sink in &self.sinks {
            let outcome = AssertUnwindSafe(sink.receive(event)).catch_unwind().await;
            record(&mut report, sink.name(), outcome, &event.title);
        }
        debug!(
            title = %event.title,
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            "Page view dispatched"
        );
        report
    }

    /// Deliver a custom event to every sink in order.
    pub async fn dispatch_custom(&self, event: &CustomEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        for sink in &self.sinks {
            let outcome = AssertUnwindSafe(sink.receive_custom(event)).catch_unwind().await;
            record(&mut report, sink.name(), outcome, &event.name);
        }
        report
    }
}

fn record(
    report: &mut DispatchReport,
    sink: String,
    outcome: std::thread::Result<Result<(), SinkError>>,
    subject: &str,
) {
    let error = match outcome {
        Ok(Ok(())) => {
            report.delivered.push(sink);
            return;
        }
        Ok(Err(error)) => error,
        Err(_) => SinkError::Panicked,
    };
    warn!(sink = %sink, %error, subject, "Sink failed to receive event");
    report.failures.push(SinkFailure { sink, error });
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sink_names())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let first = Arc::new(MemorySink::new("first"));
        let failing = Arc::new(FailingSink::new());
        let third = Arc::new(MemorySink::new("third"));
        let sinks: Vec<Arc<dyn Sink>> = vec![first.clone(), failing.clone(), third.clone()];
        let dispatcher = Dispatcher::new(sinks);

        let report = dispatcher.dispatch(&sample_event("Home")).await;

        assert_eq!(first.page_views().len(), 1);
        assert_eq!(third.page_views().len(), 1);
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(report.delivered, vec!["first".to_string(), "third".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].sink, "failing");
    }

    #[tokio::test]
    async fn test_panicking_sink_is_isolated() {
        let after = Arc::new(MemorySink::new("after"));
        let dispatcher = Dispatcher::default()
            .with_sink(Arc::new(PanickingSink))
            .with_sink(after.clone());

        let report = dispatcher.dispatch(&sample_event("Home")).await;

        assert_eq!(report.failures[0].error, SinkError::Panicked);
        assert_eq!(after.page_views().len(), 1);
    }

    #[tokio::test]
    async fn test_no_sinks_is_fine() {
        let report = Dispatcher::default().dispatch(&sample_event("Empty")).await;
        assert!(report.is_clean());
        assert!(report.delivered.is_empty());
    }

    #[tokio::test]
    async fn test_custom_events_use_default_receive() {
        let memory = Arc::new(MemorySink::new("memory"));
        let dispatcher = Dispatcher::default()
            .with_sink(Arc::new(FailingSink::new()))
            .with_sink(memory.clone());

        let report = dispatcher
            .dispatch_custom(&CustomEvent::new("play", crate::labels::LabelSet::new()))
            .await;

        // FailingSink keeps the default custom handler
        assert!(report.is_clean());
        assert_eq!(memory.custom_events().len(), 1);
    }
}
