use std::collections::HashMap;
use tracing::trace;

use super::LifecycleSignal;
use crate::trackable::UnitId;

/// Raw transition reported by the host UI toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTransition {
    /// Presentation started (animation in progress).
    WillAppear(UnitId),
    /// Presentation finished.
    DidAppear(UnitId),
    /// Dismissal started.
    WillDisappear(UnitId),
    /// Dismissal finished, or the unit was removed from the hierarchy.
    DidDisappear(UnitId),
    /// Something (a modal, an overlay) now partially or fully covers the unit.
    Covered(UnitId),
    /// The covering presentation went away.
    Uncovered(UnitId),
    DidEnterBackground,
    WillEnterForeground,
}

#[derive(Debug, Default)]
struct Presence {
    presented: bool,
    covered: bool,
    /// A `BecameVisible` went out without its matching `BecameHidden`.
    signalled: bool,
    presented_at: u64,
}

impl Presence {
    fn fully_visible(&self) -> bool {
        self.presented && !self.covered
    }
}

/// Turns host transitions into normalized [`LifecycleSignal`]s.
///
/// Visibility is only signalled once a unit is fully presented and
/// uncovered, and every `BecameVisible` is paired with one `BecameHidden`.
/// Backgrounding is the exception: the host signal alone ends the
/// appearance, and foregrounding re-delivers `BecameVisible` for every unit
/// still on screen so that it gets tracked again.
#[derive(Debug, Default)]
pub struct AppearanceObserver {
    units: HashMap<UnitId, Presence>,
    backgrounded: bool,
    clock: u64,
}

impl AppearanceObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_backgrounded(&self) -> bool {
        self.backgrounded
    }

    /// Units currently signalled visible.
    pub fn visible_units(&self) -> Vec<UnitId> {
        let mut visible: Vec<(&UnitId, &Presence)> =
            self.units.iter().filter(|(_, p)| p.signalled).collect();
        visible.sort_by_key(|(_, p)| p.presented_at);
        visible.into_iter().map(|(id, _)| *id).collect()
    }

    /// Drop all knowledge about a unit, e.g. when it is deallocated.
    pub fn forget(&mut self, unit: UnitId) -> Option<LifecycleSignal> {
        let presence = self.units.remove(&unit)?;
        presence.signalled.then_some(LifecycleSignal::BecameHidden(unit))
    }

    /// Feed one transition; returns the signals it produced, in order.
    pub fn observe(&mut self, transition: HostTransition) -> Vec<LifecycleSignal> {
        let mut signals = Vec::new();
        match transition {
            HostTransition::WillAppear(_) | HostTransition::WillDisappear(_) => {}
            HostTransition::DidAppear(unit) => {
                self.clock += 1;
                let clock = self.clock;
                let presence = self.units.entry(unit).or_default();
                if !presence.presented {
                    presence.presented_at = clock;
                }
                presence.presented = true;
                self.reveal(unit, &mut signals);
            }
            HostTransition::DidDisappear(unit) => {
                // A dismissed unit is no longer under whatever covered it
                if let Some(presence) = self.units.get_mut(&unit) {
                    presence.presented = false;
                    presence.covered = false;
                }
                self.conceal(unit, &mut signals);
            }
            HostTransition::Covered(unit) => {
                self.units.entry(unit).or_default().covered = true;
                self.conceal(unit, &mut signals);
            }
            HostTransition::Uncovered(unit) => {
                if let Some(presence) = self.units.get_mut(&unit) {
                    presence.covered = false;
                }
                self.reveal(unit, &mut signals);
            }
            HostTransition::DidEnterBackground => {
                if !self.backgrounded {
                    self.backgrounded = true;
                    for presence in self.units.values_mut() {
                        presence.signalled = false;
                    }
                    signals.push(LifecycleSignal::HostBackgrounded);
                }
            }
            HostTransition::WillEnterForeground => {
                if self.backgrounded {
                    self.backgrounded = false;
                    signals.push(LifecycleSignal::HostForegrounded);

                    let mut on_screen: Vec<(UnitId, u64)> = self
                        .units
                        .iter()
                        .filter(|(_, p)| p.fully_visible())
                        .map(|(id, p)| (*id, p.presented_at))
                        .collect();
                    on_screen.sort_by_key(|(_, at)| *at);
                    for (unit, _) in on_screen {
                        self.reveal(unit, &mut signals);
                    }
                }
            }
        }
        trace!(?transition, ?signals, "Host transition observed");
        signals
    }

    fn reveal(&mut self, unit: UnitId, signals: &mut Vec<LifecycleSignal>) {
        if self.backgrounded {
            return;
        }
        if let Some(presence) = self.units.get_mut(&unit) {
            if presence.fully_visible() && !presence.signalled {
                presence.signalled = true;
                signals.push(LifecycleSignal::BecameVisible(unit));
            }
        }
    }

    fn conceal(&mut self, unit: UnitId, signals: &mut Vec<LifecycleSignal>) {
        if let Some(presence) = self.units.get_mut(&unit) {
            if presence.signalled {
                presence.signalled = false;
                signals.push(LifecycleSignal::BecameHidden(unit));
            }
        }
    }
}
