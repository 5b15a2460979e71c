//! Diagnostics
//!
//! Contract breaches by trackable units and soft lifecycle anomalies are
//! never returned to the code delivering lifecycle signals. They go to a
//! [`DiagnosticReporter`] instead.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::lifecycle::LifecycleSignal;
use crate::trackable::UnitId;

/// Invalid data supplied by a trackable unit or tracker caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("{unit} declared an empty page view title")]
    EmptyTitle { unit: UnitId },
    #[error("manual page view requested with an empty title")]
    EmptyManualTitle,
    #[error("custom event requested with an empty name")]
    EmptyEventName,
    #[error("{unit} registered under unknown parent {parent}")]
    UnknownParent { unit: UnitId, parent: UnitId },
    #[error("{unit} was registered twice")]
    DuplicateRegistration { unit: UnitId },
}

/// A signal that is a no-op in the state it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleOrderingAnomaly {
    #[error("{0} signalled visible twice")]
    AlreadyVisible(UnitId),
    #[error("{0} hidden while not visible")]
    NotVisible(UnitId),
    #[error("signal {0} for unregistered unit")]
    UnknownUnit(LifecycleSignal),
    #[error("{0} appeared while the host is in background")]
    Backgrounded(UnitId),
}

/// Observational sink for contract breaches. Implementations must not panic.
pub trait DiagnosticReporter: Send + Sync {
    fn report(&self, violation: &ContractViolation);

    /// Soft anomalies are dropped unless a reporter opts in.
    fn report_anomaly(&self, _anomaly: &LifecycleOrderingAnomaly) {}
}

/// Reporter writing to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl DiagnosticReporter for TracingReporter {
    fn report(&self, violation: &ContractViolation) {
        warn!(%violation, "Tracking contract violation");
    }

    fn report_anomaly(&self, anomaly: &LifecycleOrderingAnomaly) {
        debug!(%anomaly, "Lifecycle signal absorbed");
    }
}

/// Reporter keeping everything it sees, for tests and inspection.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    violations: Mutex<Vec<ContractViolation>>,
    anomalies: Mutex<Vec<LifecycleOrderingAnomaly>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> Vec<ContractViolation> {
        self.violations.lock().clone()
    }

    pub fn anomalies(&self) -> Vec<LifecycleOrderingAnomaly> {
        self.anomalies.lock().clone()
    }
}

impl DiagnosticReporter for CollectingReporter {
    fn report(&self, violation: &ContractViolation) {
        self.violations.lock().push(violation.clone());
    }

    fn report_anomaly(&self, anomaly: &LifecycleOrderingAnomaly) {
        self.anomalies.lock().push(anomaly.clone());
    }
}
