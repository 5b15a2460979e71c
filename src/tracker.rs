//! Tracker context
//!
//! Explicit, owned replacement for a process-wide tracker: built at
//! application start, passed to whatever drives the UI, and stopped at
//! shutdown. It wires the lifecycle observer, the page view engine and the
//! dispatch worker together.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, TrackerConfig};
use crate::diagnostics::{ContractViolation, DiagnosticReporter, TracingReporter};
use crate::dispatch::{spawn_worker, DispatchHandle, Dispatcher, Outbound, Sink};
use crate::engine::{PageViewEngine, SignalOutcome, UnitState};
use crate::event::{CustomEvent, PageViewEvent};
use crate::event_bus::{EventBus, TrackerEvent};
use crate::labels::{GlobalLabelsSource, LabelSet};
use crate::lifecycle::{AppearanceObserver, HostTransition, LifecycleSignal};
use crate::trackable::{Trackable, TrackableDeclaration, UnitId};

/// Label carrying the unit testing identifier.
pub const UNIT_TESTING_LABEL: &str = "unit_testing_identifier";

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tracker must be started from within a tokio runtime")]
    NoRuntime,
}

/// Global labels as seen by the engine: configuration context, the
/// application's own source, then the unit testing identifier.
struct LayeredGlobals {
    context: LabelSet,
    source: Option<Arc<dyn GlobalLabelsSource>>,
    unit_testing_id: Option<Arc<RwLock<String>>>,
}

impl GlobalLabelsSource for LayeredGlobals {
    fn global_labels(&self) -> LabelSet {
        let mut labels = self.context.clone();
        if let Some(source) = &self.source {
            labels = LabelSet::merge(&labels, &source.global_labels());
        }
        if let Some(id) = &self.unit_testing_id {
            labels = labels.with(UNIT_TESTING_LABEL, id.read().clone());
        }
        labels
    }
}

pub struct TrackerBuilder {
    config: TrackerConfig,
    sinks: Vec<Arc<dyn Sink>>,
    reporter: Arc<dyn DiagnosticReporter>,
    global_labels: Option<Arc<dyn GlobalLabelsSource>>,
}

impl TrackerBuilder {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            reporter: Arc::new(TracingReporter),
            global_labels: None,
        }
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn DiagnosticReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn global_labels(mut self, source: Arc<dyn GlobalLabelsSource>) -> Self {
        self.global_labels = Some(source);
        self
    }

    /// Validate the configuration and spawn the dispatch worker on the
    /// current tokio runtime.
    pub fn start(self) -> Result<Tracker, StartError> {
        self.config.validate()?;
        if Handle::try_current().is_err() {
            return Err(StartError::NoRuntime);
        }

        let bus = self
            .config
            .unit_testing
            .then(|| Arc::new(EventBus::new(self.config.event_bus_capacity)));
        let unit_testing_id = self
            .config
            .unit_testing
            .then(|| Arc::new(RwLock::new(Uuid::new_v4().to_string())));

        let dispatcher = Arc::new(Dispatcher::new(self.sinks));
        let (handle, worker) = spawn_worker(dispatcher.clone(), bus.clone());

        let globals = LayeredGlobals {
            context: if self.config.context_labels {
                self.config.context_label_set()
            } else {
                LabelSet::new()
            },
            source: self.global_labels,
            unit_testing_id: unit_testing_id.clone(),
        };
        let engine = PageViewEngine::new(Arc::new(handle.clone()), self.reporter.clone())
            .with_global_labels(Arc::new(globals));

        info!(
            business_unit = %self.config.business_unit,
            site = %self.config.site_name(),
            measuring_unit = %self.config.measuring_unit(),
            sinks = ?dispatcher.sink_names(),
            unit_testing = self.config.unit_testing,
            "🚀 Tracker started"
        );

        Ok(Tracker {
            config: self.config,
            engine: Mutex::new(engine),
            observer: Mutex::new(AppearanceObserver::new()),
            handle,
            worker,
            bus,
            reporter: self.reporter,
            unit_testing_id,
        })
    }
}

pub struct Tracker {
    config: TrackerConfig,
    engine: Mutex<PageViewEngine>,
    observer: Mutex<AppearanceObserver>,
    handle: DispatchHandle,
    worker: JoinHandle<u64>,
    bus: Option<Arc<EventBus>>,
    reporter: Arc<dyn DiagnosticReporter>,
    unit_testing_id: Option<Arc<RwLock<String>>>,
}

impl Tracker {
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder::new(config)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Register a trackable unit, optionally inside a logical parent.
    pub fn register(
        &self,
        unit: Arc<dyn Trackable>,
        parent: Option<UnitId>,
    ) -> Result<UnitId, ContractViolation> {
        let id = UnitId::next();
        self.engine.lock().register(id, unit, parent)?;
        Ok(id)
    }

    /// Remove a unit, ending its appearance if it had one.
    pub fn unregister(&self, id: UnitId) -> bool {
        let mut observer = self.observer.lock();
        let hidden = observer.forget(id);
        let mut engine = self.engine.lock();
        if let Some(signal) = hidden {
            engine.handle(signal);
        }
        engine.unregister(id)
    }

    /// Feed a raw host transition through the observer and the engine.
    /// The observer lock is held until the engine has applied its signals.
    pub fn observe(&self, transition: HostTransition) -> Vec<SignalOutcome> {
        let mut observer = self.observer.lock();
        let signals = observer.observe(transition);
        let mut engine = self.engine.lock();
        signals.into_iter().map(|s| engine.handle(s)).collect()
    }

    /// Feed an already normalized signal straight to the engine.
    pub fn signal(&self, signal: LifecycleSignal) -> SignalOutcome {
        self.engine.lock().handle(signal)
    }

    pub fn unit_state(&self, id: UnitId) -> Option<UnitState> {
        self.engine.lock().state(id)
    }

    pub fn last_page_view(&self, id: UnitId) -> Option<Arc<PageViewEvent>> {
        self.engine.lock().last_event(id)
    }

    /// Send the page view of a visible unit that has not sent one for its
    /// current appearance. Returns whether a page view went out.
    pub fn track_unit(&self, id: UnitId) -> bool {
        self.engine.lock().track_manually(id).is_some()
    }

    /// Manual page view, dropped while the host is in background.
    pub fn track_page_view(&self, declaration: &TrackableDeclaration) -> bool {
        if self.engine.lock().is_backgrounded() {
            info!(title = %declaration.title, "Page view ignored while in background");
            return false;
        }
        self.unchecked_track_page_view(declaration)
    }

    /// Manual page view sent whatever the host state.
    pub fn unchecked_track_page_view(&self, declaration: &TrackableDeclaration) -> bool {
        match self.engine.lock().build_standalone(declaration) {
            Ok(event) => self.handle.submit(Outbound::PageView(event)),
            Err(_) => false,
        }
    }

    /// Custom event for a user action. Empty names are rejected.
    pub fn track_event(&self, name: &str, labels: Option<LabelSet>) -> bool {
        if name.trim().is_empty() {
            self.reporter.report(&ContractViolation::EmptyEventName);
            return false;
        }
        let mut labels = labels.unwrap_or_default();
        if let Some(id) = &self.unit_testing_id {
            labels = labels.with(UNIT_TESTING_LABEL, id.read().clone());
        }
        self.handle
            .submit(Outbound::Custom(Arc::new(CustomEvent::new(name, labels))))
    }

    /// Subscribe to dispatched events. `None` unless unit testing is enabled.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<TrackerEvent>> {
        self.bus.as_ref().map(|bus| bus.subscribe())
    }

    pub fn unit_testing_identifier(&self) -> Option<String> {
        self.unit_testing_id.as_ref().map(|id| id.read().clone())
    }

    /// Start a new unit testing identifier for subsequent measurements.
    pub fn renew_unit_testing_identifier(&self) -> Option<String> {
        let id = self.unit_testing_id.as_ref()?;
        let fresh = Uuid::new_v4().to_string();
        *id.write() = fresh.clone();
        Some(fresh)
    }

    /// Stop accepting events, wait for queued ones to reach the sinks and
    /// return how many items the worker processed.
    pub async fn stop(self) -> u64 {
        let Tracker { engine, handle, worker, .. } = self;
        drop(engine);
        drop(handle);
        match worker.await {
            Ok(processed) => {
                info!(processed, "Tracker stopped");
                processed
            }
            Err(e) => {
                warn!(error = %e, "Dispatch worker ended abnormally");
                0
            }
        }
    }
}
