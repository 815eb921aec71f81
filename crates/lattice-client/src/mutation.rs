//! Optimistic stage moves.
//!
//! A move is split in two halves around the remote call so the board actor
//! never awaits I/O itself:
//!
//! 1. [`MutationExecutor::begin`] validates the move, captures the current
//!    stage and applies the target stage locally.
//! 2. [`MutationExecutor::settle`] takes the remote result and either adopts
//!    the server's representation or rolls the stage back.
//!
//! Moves are independent. A second move of the same item captures whatever
//! stage is local at that moment, so the last local writer wins and the
//! server stays authoritative through later refreshes.

use lattice_types::{Stage, WorkItem, WorkItemId};
use tracing::{debug, warn};

use crate::actor::BoardError;
use crate::store::EntityStore;
use crate::transport::TransportError;

/// A move applied locally and awaiting the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMove {
    pub id: WorkItemId,
    pub target: Stage,
    /// Stage to restore if the server rejects the move.
    pub previous: Stage,
}

/// Result of a move request that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    /// Target equals the current stage; nothing was sent.
    Unchanged,
    /// Server accepted the move; this is its representation of the item.
    Moved(WorkItem),
}

#[derive(Debug, Default)]
pub struct MutationExecutor {
    in_flight: usize,
}

impl MutationExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves sent to the server and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply a move locally.
    ///
    /// Returns `Ok(None)` for a same-stage move, which must not reach the
    /// server.
    pub fn begin(
        &mut self,
        store: &mut EntityStore,
        id: &WorkItemId,
        target: Stage,
    ) -> Result<Option<PendingMove>, BoardError> {
        let current = store
            .get(id)
            .map(|item| item.stage)
            .ok_or_else(|| BoardError::NotTracked(id.clone()))?;
        if current == target {
            debug!(%id, stage = %target, "move to current stage, skipping");
            return Ok(None);
        }

        store.set_stage(id, target);
        self.in_flight += 1;
        debug!(%id, from = %current, to = %target, "applied optimistic move");
        Ok(Some(PendingMove { id: id.clone(), target, previous: current }))
    }

    /// Reconcile a pending move with the server's answer.
    pub fn settle(
        &mut self,
        store: &mut EntityStore,
        pending: PendingMove,
        result: Result<WorkItem, TransportError>,
    ) -> Result<MoveOutcome, BoardError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match result {
            Ok(item) => {
                // An item deleted while the move was in flight stays deleted.
                if store.contains(&item.id) {
                    store.upsert(item.clone());
                }
                Ok(MoveOutcome::Moved(item))
            }
            Err(source) => {
                let restored = store.set_stage(&pending.id, pending.previous).is_some();
                warn!(
                    id = %pending.id,
                    stage = %pending.previous,
                    restored,
                    error = %source,
                    "move rejected, rolled back"
                );
                Err(BoardError::MoveRejected { id: pending.id, source })
            }
        }
    }

    /// Forget a pending move whose scope is gone. The store is not touched.
    pub fn abandon(&mut self, pending: &PendingMove) {
        self.in_flight = self.in_flight.saturating_sub(1);
        debug!(id = %pending.id, "dropping move settlement for a closed scope");
    }
}
