//! Stock sinks shipped with the crate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use super::{Sink, SinkError};
use crate::event::{CustomEvent, PageViewEvent};

/// Writes every event to the tracing subscriber.
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

#[async_trait]
impl Sink for LoggingSink {
    fn name(&self) -> String {
        "logging".to_string()
    }

    async fn receive(&self, event: &PageViewEvent) -> Result<(), SinkError> {
        info!(
            title = %event.title,
            kind = %event.kind,
            levels = %event.levels,
            labels = %event.labels,
            sequence = event.sequence,
            push = event.from_push_notification,
            "📊 Page view"
        );
        Ok(())
    }

    async fn receive_custom(&self, event: &CustomEvent) -> Result<(), SinkError> {
        info!(name = %event.name, labels = %event.labels, "📊 Event");
        Ok(())
    }
}

/// Keeps received events in memory for inspection.
#[derive(Debug)]
pub struct MemorySink {
    name: String,
    page_views: Mutex<Vec<Arc<PageViewEvent>>>,
    custom_events: Mutex<Vec<CustomEvent>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_views: Mutex::new(Vec::new()),
            custom_events: Mutex::new(Vec::new()),
        }
    }

    pub fn page_views(&self) -> Vec<Arc<PageViewEvent>> {
        self.page_views.lock().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.page_views.lock().iter().map(|e| e.title.clone()).collect()
    }

    pub fn custom_events(&self) -> Vec<CustomEvent> {
        self.custom_events.lock().clone()
    }

    /// Take all page views, leaving the buffer empty.
    pub fn take_page_views(&self) -> Vec<Arc<PageViewEvent>> {
        std::mem::take(&mut *self.page_views.lock())
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn receive(&self, event: &PageViewEvent) -> Result<(), SinkError> {
        self.page_views.lock().push(Arc::new(event.clone()));
        Ok(())
    }

    async fn receive_custom(&self, event: &CustomEvent) -> Result<(), SinkError> {
        self.custom_events.lock().push(event.clone());
        Ok(())
    }
}
