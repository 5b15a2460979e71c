//! Page View Deduplication & Emission Engine
//!
//! Keeps one `Idle` / `Visible(token)` state per registered unit and emits a
//! page view only on the `Idle -> Visible` transition, so each appearance
//! yields at most one event no matter how noisy the host lifecycle is.

mod resolve;
mod state;

pub use resolve::{resolve, ResolvedDeclaration};
pub use state::UnitState;

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::diagnostics::{ContractViolation, DiagnosticReporter, LifecycleOrderingAnomaly};
use crate::dispatch::{DispatchHandle, Outbound};
use crate::event::{AppearanceToken, PageViewEvent};
use crate::labels::{GlobalLabelsSource, LabelSet};
use crate::lifecycle::LifecycleSignal;
use crate::trackable::{Trackable, TrackableDeclaration, UnitId};
use state::RegisteredUnit;

/// Where emitted page views go. The engine never waits on it.
pub trait EmissionTarget: Send + Sync {
    fn emit(&self, event: Arc<PageViewEvent>);
}

impl EmissionTarget for DispatchHandle {
    fn emit(&self, event: Arc<PageViewEvent>) {
        self.submit(Outbound::PageView(event));
    }
}

/// What a signal did to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    /// A new appearance started and its page view went out.
    Emitted(Arc<PageViewEvent>),
    /// A new appearance started without a page view: the unit tracks
    /// manually, or its declaration was rejected.
    Entered(AppearanceToken),
    /// The unit left the visible state.
    Left(UnitId),
    /// Host went to background; this many appearances ended.
    Backgrounded { ended: usize },
    Foregrounded,
    /// No-op in the current state.
    Absorbed(LifecycleOrderingAnomaly),
}

impl SignalOutcome {
    pub fn emitted(&self) -> Option<&Arc<PageViewEvent>> {
        match self {
            SignalOutcome::Emitted(event) => Some(event),
            _ => None,
        }
    }
}

pub struct PageViewEngine {
    units: HashMap<UnitId, RegisteredUnit>,
    backgrounded: bool,
    target: Arc<dyn EmissionTarget>,
    reporter: Arc<dyn DiagnosticReporter>,
    global_labels: Option<Arc<dyn GlobalLabelsSource>>,
    started: Instant,
    sequence: u64,
}

impl PageViewEngine {
    pub fn new(target: Arc<dyn EmissionTarget>, reporter: Arc<dyn DiagnosticReporter>) -> Self {
        Self {
            units: HashMap::new(),
            backgrounded: false,
            target,
            reporter,
            global_labels: None,
            started: Instant::now(),
            sequence: 0,
        }
    }

    pub fn with_global_labels(mut self, source: Arc<dyn GlobalLabelsSource>) -> Self {
        self.global_labels = Some(source);
        self
    }

    /// Register a unit under an optional logical parent whose declaration
    /// it layers over.
    pub fn register(
        &mut self,
        id: UnitId,
        unit: Arc<dyn Trackable>,
        parent: Option<UnitId>,
    ) -> Result<(), ContractViolation> {
        let violation = if self.units.contains_key(&id) {
            Some(ContractViolation::DuplicateRegistration { unit: id })
        } else {
            parent
                .filter(|p| !self.units.contains_key(p))
                .map(|parent| ContractViolation::UnknownParent { unit: id, parent })
        };
        if let Some(violation) = violation {
            self.reporter.report(&violation);
            return Err(violation);
        }

        debug!(%id, ?parent, "Trackable unit registered");
        self.units.insert(id, RegisteredUnit::new(unit, parent));
        Ok(())
    }

    /// Forget a unit. Children keep their link but stop inheriting from it.
    pub fn unregister(&mut self, id: UnitId) -> bool {
        self.units.remove(&id).is_some()
    }

    pub fn state(&self, id: UnitId) -> Option<UnitState> {
        self.units.get(&id).map(|u| u.state)
    }

    pub fn last_event(&self, id: UnitId) -> Option<Arc<PageViewEvent>> {
        self.units.get(&id).and_then(|u| u.last_event.clone())
    }

    pub fn is_backgrounded(&self) -> bool {
        self.backgrounded
    }

    pub fn registered(&self) -> usize {
        self.units.len()
    }

    /// Apply one lifecycle signal.
    pub fn handle(&mut self, signal: LifecycleSignal) -> SignalOutcome {
        let outcome = match signal {
            LifecycleSignal::BecameVisible(id) => self.became_visible(id),
            LifecycleSignal::BecameHidden(id) => self.became_hidden(id),
            LifecycleSignal::HostBackgrounded => {
                self.backgrounded = true;
                let mut ended = 0;
                for unit in self.units.values_mut() {
                    if unit.state.is_visible() {
                        unit.state = UnitState::Idle;
                        ended += 1;
                    }
                }
                info!(ended, "Host backgrounded, appearances ended");
                SignalOutcome::Backgrounded { ended }
            }
            LifecycleSignal::HostForegrounded => {
                self.backgrounded = false;
                info!("Host foregrounded");
                SignalOutcome::Foregrounded
            }
        };

        if let SignalOutcome::Absorbed(anomaly) = &outcome {
            self.reporter.report_anomaly(anomaly);
        }
        outcome
    }

    /// Emit the page view of a visible unit tracking manually. At most one
    /// attempt per appearance; a rejected declaration settles it too.
    pub fn track_manually(&mut self, id: UnitId) -> Option<Arc<PageViewEvent>> {
        if self.backgrounded {
            return None;
        }
        let token = match self.units.get(&id)?.state {
            UnitState::Visible { token, settled: false } => token,
            _ => return None,
        };
        let declaration = self.units.get(&id)?.unit.declare();
        self.emit_for(id, token, declaration)
    }

    /// Build a page view not tied to any unit. Global labels still apply.
    pub fn build_standalone(
        &mut self,
        declaration: &TrackableDeclaration,
    ) -> Result<Arc<PageViewEvent>, ContractViolation> {
        if !declaration.has_title() {
            let violation = ContractViolation::EmptyManualTitle;
            self.reporter.report(&violation);
            return Err(violation);
        }
        let base = self.base_labels();
        let resolved = resolve(&base, std::slice::from_ref(declaration))
            .ok_or(ContractViolation::EmptyManualTitle)?;
        Ok(self.build_event(resolved, None, None))
    }

    fn became_visible(&mut self, id: UnitId) -> SignalOutcome {
        let Some(registered) = self.units.get(&id) else {
            return SignalOutcome::Absorbed(LifecycleOrderingAnomaly::UnknownUnit(
                LifecycleSignal::BecameVisible(id),
            ));
        };
        if self.backgrounded {
            return SignalOutcome::Absorbed(LifecycleOrderingAnomaly::Backgrounded(id));
        }
        if registered.state.is_visible() {
            return SignalOutcome::Absorbed(LifecycleOrderingAnomaly::AlreadyVisible(id));
        }

        let token = AppearanceToken::issue();
        let declaration = registered.unit.declare();
        if let Some(unit) = self.units.get_mut(&id) {
            unit.state = UnitState::Visible { token, settled: false };
        }

        if !declaration.tracked_automatically {
            debug!(%id, %token, "Appearance started, waiting for manual tracking");
            return SignalOutcome::Entered(token);
        }
        match self.emit_for(id, token, declaration) {
            Some(event) => SignalOutcome::Emitted(event),
            None => SignalOutcome::Entered(token),
        }
    }

    fn became_hidden(&mut self, id: UnitId) -> SignalOutcome {
        let Some(unit) = self.units.get_mut(&id) else {
            return SignalOutcome::Absorbed(LifecycleOrderingAnomaly::UnknownUnit(
                LifecycleSignal::BecameHidden(id),
            ));
        };
        match unit.state {
            UnitState::Visible { token, .. } => {
                unit.state = UnitState::Idle;
                debug!(%id, %token, "Appearance ended");
                SignalOutcome::Left(id)
            }
            UnitState::Idle => SignalOutcome::Absorbed(LifecycleOrderingAnomaly::NotVisible(id)),
        }
    }

    /// Resolve `declaration` of `id` over its ancestors and emit under
    /// `token`. Reports and returns `None` on an empty title.
    fn emit_for(
        &mut self,
        id: UnitId,
        token: AppearanceToken,
        declaration: TrackableDeclaration,
    ) -> Option<Arc<PageViewEvent>> {
        if !declaration.has_title() {
            self.reporter.report(&ContractViolation::EmptyTitle { unit: id });
            if let Some(unit) = self.units.get_mut(&id) {
                unit.state = UnitState::Visible { token, settled: true };
            }
            return None;
        }

        let mut chain = self.ancestor_declarations(id);
        chain.push(declaration);
        let base = self.base_labels();
        let resolved = resolve(&base, &chain)?;
        let event = self.build_event(resolved, Some(id), Some(token));

        if let Some(unit) = self.units.get_mut(&id) {
            unit.state = UnitState::Visible { token, settled: true };
            unit.last_event = Some(event.clone());
        }
        info!(%id, title = %event.title, sequence = event.sequence, "Page view emitted");
        self.target.emit(event.clone());
        Some(event)
    }

    /// Declarations of the registered ancestors of `id`, outermost first.
    fn ancestor_declarations(&self, id: UnitId) -> Vec<TrackableDeclaration> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut cursor = self.units.get(&id).and_then(|u| u.parent);
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                break;
            }
            let Some(parent) = self.units.get(&parent_id) else {
                break;
            };
            chain.push(parent.unit.declare());
            cursor = parent.parent;
        }
        chain.reverse();
        chain
    }

    fn base_labels(&self) -> LabelSet {
        self.global_labels
            .as_ref()
            .map(|source| source.global_labels())
            .unwrap_or_default()
    }

    fn build_event(
        &mut self,
        resolved: ResolvedDeclaration,
        unit: Option<UnitId>,
        token: Option<AppearanceToken>,
    ) -> Arc<PageViewEvent> {
        self.sequence += 1;
        Arc::new(PageViewEvent {
            title: resolved.title,
            kind: resolved.kind,
            levels: resolved.levels,
            labels: resolved.labels,
            from_push_notification: resolved.from_push_notification,
            unit,
            token,
            sequence: self.sequence,
            emitted_at: self.started.elapsed(),
            recorded_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for PageViewEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageViewEngine")
            .field("units", &self.units.len())
            .field("backgrounded", &self.backgrounded)
            .field("sequence", &self.sequence)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::CollectingTarget;
    use super::*;
    use crate::diagnostics::CollectingReporter;
    use crate::labels::LevelPath;
    use crate::trackable::StaticTrackable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use LifecycleSignal::*;

    fn engine() -> (PageViewEngine, Arc<CollectingTarget>, Arc<CollectingReporter>) {
        let target = Arc::new(CollectingTarget::default());
        let reporter = Arc::new(CollectingReporter::new());
        let engine = PageViewEngine::new(target.clone(), reporter.clone());
        (engine, target, reporter)
    }

    fn register(engine: &mut PageViewEngine, decl: TrackableDeclaration, parent: Option<UnitId>) -> UnitId {
        let id = UnitId::next();
        engine
            .register(id, Arc::new(StaticTrackable::new(decl)), parent)
            .unwrap();
        id
    }

    #[test]
    fn test_exactly_once_per_appearance() {
        let (mut engine, target, _) = engine();
        let home = register(&mut engine, TrackableDeclaration::new("Home"), None);

        for _ in 0..3 {
            assert!(engine.handle(BecameVisible(home)).emitted().is_some());
            engine.handle(BecameHidden(home));
        }
        assert_eq!(target.count(), 3);
        let sequences: Vec<u64> = target.events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_visible_is_absorbed() {
        let (mut engine, target, reporter) = engine();
        let home = register(&mut engine, TrackableDeclaration::new("Home"), None);

        engine.handle(BecameVisible(home));
        let second = engine.handle(BecameVisible(home));

        assert_eq!(
            second,
            SignalOutcome::Absorbed(LifecycleOrderingAnomaly::AlreadyVisible(home))
        );
        assert_eq!(target.count(), 1);
        assert_eq!(reporter.anomalies().len(), 1);
        assert!(reporter.violations().is_empty());
    }

    #[test]
    fn test_background_invalidates_token() {
        let (mut engine, target, _) = engine();
        let home = register(&mut engine, TrackableDeclaration::new("Home"), None);

        engine.handle(BecameVisible(home));
        let first_token = engine.state(home).and_then(|s| s.token()).unwrap();

        assert_eq!(engine.handle(HostBackgrounded), SignalOutcome::Backgrounded { ended: 1 });
        assert_eq!(engine.state(home), Some(UnitState::Idle));
        // Appearing while in background is not tracked
        assert!(matches!(
            engine.handle(BecameVisible(home)),
            SignalOutcome::Absorbed(LifecycleOrderingAnomaly::Backgrounded(_))
        ));

        engine.handle(HostForegrounded);
        assert_eq!(target.count(), 1);
        engine.handle(BecameVisible(home));

        let events = target.events();
        assert_eq!(events.len(), 2);
        assert_ne!(events[1].token, Some(first_token));
    }

    #[test]
    fn test_idle_background_is_noop() {
        let (mut engine, target, _) = engine();
        register(&mut engine, TrackableDeclaration::new("Home"), None);
        assert_eq!(engine.handle(HostBackgrounded), SignalOutcome::Backgrounded { ended: 0 });
        assert_eq!(target.count(), 0);
    }

    #[test]
    fn test_hidden_while_idle_is_absorbed() {
        let (mut engine, _, _) = engine();
        let home = register(&mut engine, TrackableDeclaration::new("Home"), None);
        assert_eq!(
            engine.handle(BecameHidden(home)),
            SignalOutcome::Absorbed(LifecycleOrderingAnomaly::NotVisible(home))
        );
    }

    #[test]
    fn test_unknown_unit_is_absorbed() {
        let (mut engine, target, _) = engine();
        let ghost = UnitId::next();
        assert!(matches!(
            engine.handle(BecameVisible(ghost)),
            SignalOutcome::Absorbed(LifecycleOrderingAnomaly::UnknownUnit(_))
        ));
        assert_eq!(target.count(), 0);
    }

    #[test]
    fn test_empty_title_suppresses_only_that_appearance() {
        let (mut engine, target, reporter) = engine();
        let valid = Arc::new(AtomicUsize::new(0));
        let flag = valid.clone();
        let id = UnitId::next();
        engine
            .register(
                id,
                Arc::new(move || {
                    let title = if flag.load(Ordering::SeqCst) == 0 { "" } else { "Loaded" };
                    TrackableDeclaration::new(title)
                }),
                None,
            )
            .unwrap();

        assert!(matches!(engine.handle(BecameVisible(id)), SignalOutcome::Entered(_)));
        // Still visible: duplicates stay absorbed and emit nothing
        engine.handle(BecameVisible(id));
        engine.handle(BecameHidden(id));
        assert_eq!(target.count(), 0);
        assert_eq!(reporter.violations(), vec![ContractViolation::EmptyTitle { unit: id }]);

        valid.store(1, Ordering::SeqCst);
        engine.handle(BecameVisible(id));
        assert_eq!(target.events()[0].title, "Loaded");
        assert_eq!(reporter.violations().len(), 1);
    }

    #[test]
    fn test_suppressed_appearance_cannot_be_tracked_manually() {
        let (mut engine, target, reporter) = engine();
        let valid = Arc::new(AtomicUsize::new(0));
        let flag = valid.clone();
        let id = UnitId::next();
        engine
            .register(
                id,
                Arc::new(move || {
                    let title = if flag.load(Ordering::SeqCst) == 0 { "" } else { "Loaded" };
                    TrackableDeclaration::new(title)
                }),
                None,
            )
            .unwrap();

        engine.handle(BecameVisible(id));
        valid.store(1, Ordering::SeqCst);
        assert!(engine.track_manually(id).is_none());
        assert_eq!(target.count(), 0);
        assert!(matches!(
            engine.state(id),
            Some(UnitState::Visible { settled: true, .. })
        ));

        engine.handle(BecameHidden(id));
        assert!(engine.handle(BecameVisible(id)).emitted().is_some());
        assert_eq!(reporter.violations().len(), 1);
    }

    #[test]
    fn test_ancestor_context_is_merged() {
        let (mut engine, target, _) = engine();
        let parent = register(
            &mut engine,
            TrackableDeclaration::new("Parent")
                .with_levels(LevelPath::new(["a"]))
                .with_labels(LabelSet::from_pairs([("x", "1")])),
            None,
        );
        let child = register(
            &mut engine,
            TrackableDeclaration::new("Child")
                .with_levels(LevelPath::new(["b"]))
                .with_labels(LabelSet::from_pairs([("x", "2"), ("y", "3")])),
            Some(parent),
        );

        engine.handle(BecameVisible(child));

        let event = &target.events()[0];
        assert_eq!(event.title, "Child");
        assert_eq!(event.levels, LevelPath::new(["a", "b"]));
        assert_eq!(event.labels, LabelSet::from_pairs([("x", "2"), ("y", "3")]));
        assert_eq!(event.unit, Some(child));
    }

    #[test]
    fn test_global_labels_under_everything() {
        let target = Arc::new(CollectingTarget::default());
        let mut engine = PageViewEngine::new(target.clone(), Arc::new(CollectingReporter::new()))
            .with_global_labels(Arc::new(LabelSet::from_pairs([("app", "demo"), ("y", "g")])));
        let id = register(
            &mut engine,
            TrackableDeclaration::new("Home").with_labels(LabelSet::from_pairs([("y", "own")])),
            None,
        );

        engine.handle(BecameVisible(id));
        assert_eq!(
            target.events()[0].labels,
            LabelSet::from_pairs([("app", "demo"), ("y", "own")])
        );
    }

    #[test]
    fn test_manual_unit_waits_for_explicit_tracking() {
        let (mut engine, target, _) = engine();
        let id = register(&mut engine, TrackableDeclaration::new("Article").manual(), None);

        assert!(matches!(engine.handle(BecameVisible(id)), SignalOutcome::Entered(_)));
        assert_eq!(target.count(), 0);

        assert!(engine.track_manually(id).is_some());
        // One event per appearance, even for manual tracking
        assert!(engine.track_manually(id).is_none());
        assert_eq!(target.count(), 1);

        engine.handle(BecameHidden(id));
        assert!(engine.track_manually(id).is_none());
    }

    #[test]
    fn test_registration_violations() {
        let (mut engine, _, reporter) = engine();
        let id = UnitId::next();
        let orphan_parent = UnitId::next();
        let unit = Arc::new(StaticTrackable::titled("X"));

        assert_eq!(
            engine.register(id, unit.clone(), Some(orphan_parent)),
            Err(ContractViolation::UnknownParent { unit: id, parent: orphan_parent })
        );
        engine.register(id, unit.clone(), None).unwrap();
        assert!(engine.register(id, unit, None).is_err());
        assert_eq!(reporter.violations().len(), 2);
    }

    #[test]
    fn test_standalone_page_view() {
        let (mut engine, target, reporter) = engine();
        let event = engine
            .build_standalone(&TrackableDeclaration::new("Widget").with_kind("widget"))
            .unwrap();
        assert_eq!(event.kind, "widget");
        assert!(event.unit.is_none());
        // Standalone events are handed back, not emitted
        assert_eq!(target.count(), 0);

        assert!(engine.build_standalone(&TrackableDeclaration::new("")).is_err());
        assert_eq!(reporter.violations(), vec![ContractViolation::EmptyManualTitle]);
    }
}
