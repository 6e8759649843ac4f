//! This module contains the type definitions necessary to observe the progress
//! of the decompiler as it moves through its stages.
//!
//! The decompiler itself produces no output. Everything it has to say about
//! its progress is reported as an [`Event`] to the [`Observer`] it was
//! constructed with, and it is up to the client to decide what, if anything,
//! happens to those events.

use std::{
    fmt::Debug,
    sync::{Arc, Mutex, PoisonError},
};

use crate::contract::EntryPoint;

/// A dynamically dispatched [`Observer`] instance.
pub type DynObserver = Arc<dyn Observer>;

/// Something notable that happened while decompiling a contract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    /// Symbolic execution of `entry` has begun.
    ExplorationStarted { entry: EntryPoint },

    /// Symbolic execution of `entry` has produced `states` terminal states,
    /// `partial` of which were not fully explored.
    ExplorationFinished {
        entry:   EntryPoint,
        states:  usize,
        partial: usize,
    },

    /// The entry has been assembled into `behaviours` behaviours.
    EntryAssembled {
        entry:      EntryPoint,
        behaviours: usize,
    },

    /// The entry could not be assembled.
    EntryRejected { entry: EntryPoint, reason: String },

    /// Enrichment added `added` preconditions to the entry.
    PreconditionsEnriched { entry: EntryPoint, added: usize },

    /// The equivalence of the entry with its bytecode has been checked.
    EquivalenceChecked { entry: EntryPoint, equivalent: bool },

    /// The exhaustiveness of the behaviours has been checked, finding
    /// `missing` selectors that no behaviour covers.
    ExhaustivenessChecked { missing: usize },
}

/// The interface to an object that is told about the progress of the
/// decompiler.
///
/// Observation must not fail and should be cheap, as it happens synchronously
/// within the stages that produce the events.
pub trait Observer
where
    Self: Debug + Send + Sync,
{
    /// Observes the provided `event`.
    fn observe(&self, event: &Event);
}

/// An implementation of the [`Observer`] trait that discards every event.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NullObserver;

impl NullObserver {
    /// Wraps `self` into an [`Arc`].
    #[must_use]
    pub fn in_arc(self) -> DynObserver {
        Arc::new(self)
    }
}

impl Observer for NullObserver {
    fn observe(&self, _event: &Event) {}
}

/// An observer that forwards every event to [`tracing`].
///
/// Rejections and failed checks are reported as warnings, and everything else
/// as information or, for the start of exploration, debug output.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TracingObserver;

impl TracingObserver {
    /// Wraps `self` into an [`Arc`].
    #[must_use]
    pub fn in_arc(self) -> DynObserver {
        Arc::new(self)
    }
}

impl Observer for TracingObserver {
    fn observe(&self, event: &Event) {
        match event {
            Event::ExplorationStarted { entry } => {
                tracing::debug!(%entry, "exploration started");
            }
            Event::ExplorationFinished {
                entry,
                states,
                partial,
            } => {
                tracing::info!(%entry, states, partial, "exploration finished");
            }
            Event::EntryAssembled { entry, behaviours } => {
                tracing::info!(%entry, behaviours, "entry assembled");
            }
            Event::EntryRejected { entry, reason } => {
                tracing::warn!(%entry, %reason, "entry rejected");
            }
            Event::PreconditionsEnriched { entry, added } => {
                tracing::info!(%entry, added, "preconditions enriched");
            }
            Event::EquivalenceChecked { entry, equivalent } => {
                if *equivalent {
                    tracing::info!(%entry, "equivalence checked");
                } else {
                    tracing::warn!(%entry, "counterexample found");
                }
            }
            Event::ExhaustivenessChecked { missing } => {
                if *missing == 0 {
                    tracing::info!("exhaustiveness checked");
                } else {
                    tracing::warn!(missing, "selectors are not covered");
                }
            }
        }
    }
}

/// An observer that records every event it sees, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    /// Constructs a new observer that has recorded nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a copy of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        contract::EntryPoint,
        observer::{
            DynObserver,
            Event,
            NullObserver,
            Observer,
            RecordingObserver,
            TracingObserver,
        },
    };

    #[test]
    fn records_events_in_order() {
        let observer = Arc::new(RecordingObserver::new());
        let dynamic: DynObserver = observer.clone();

        let first = Event::ExplorationStarted {
            entry: EntryPoint::Constructor,
        };
        let second = Event::ExhaustivenessChecked { missing: 0 };
        dynamic.observe(&first);
        dynamic.observe(&second);

        assert_eq!(observer.events(), vec![first, second]);
    }

    #[test]
    fn other_observers_accept_events() {
        let event = Event::EntryRejected {
            entry:  EntryPoint::Runtime,
            reason: "unsupported".into(),
        };
        NullObserver.in_arc().observe(&event);
        TracingObserver.in_arc().observe(&event);
    }
}
