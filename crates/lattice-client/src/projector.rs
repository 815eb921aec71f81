//! Incremental projection of single live events onto the store.
//!
//! Only what an event states unambiguously is applied here: removal of a
//! deleted work item and open-question bookkeeping. Everything else (title,
//! stage, review state, ...) is left to the coalesced full refresh.

use lattice_types::{Delta, LiveEvent, WorkItemId};
use tracing::trace;

use crate::store::EntityStore;

/// What [`project`] did to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Projection {
    /// Subject removed. `was_tracked` is false when only counters were purged.
    Removed { id: WorkItemId, was_tracked: bool },
    /// Subject's open-question count changed to `count`.
    Counter { id: WorkItemId, count: u32 },
    /// No incremental change; a refresh must reconcile.
    Unchanged,
}

impl Projection {
    pub fn changed_store(&self) -> bool {
        !matches!(self, Projection::Unchanged)
    }
}

/// Apply one event's delta. Events without a subject never change the store.
pub fn project(store: &mut EntityStore, event: &LiveEvent) -> Projection {
    let Some(id) = event.subject_id.as_ref() else {
        trace!(action = %event.action, "event without subject, refresh only");
        return Projection::Unchanged;
    };

    match event.delta() {
        Delta::RemoveSubject => {
            let was_tracked = store.remove(id).is_some();
            trace!(%id, was_tracked, "removed work item from live event");
            Projection::Removed { id: id.clone(), was_tracked }
        }
        Delta::IncrementCounter => {
            let count = store.increment_open_questions(id);
            Projection::Counter { id: id.clone(), count }
        }
        Delta::DecrementCounter => {
            let count = store.decrement_open_questions(id);
            Projection::Counter { id: id.clone(), count }
        }
        Delta::None => Projection::Unchanged,
    }
}
