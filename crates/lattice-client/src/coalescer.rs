//! Fixed-delay refresh debounce.
//!
//! A single-slot deadline. The first [`RefreshCoalescer::schedule`] of a burst
//! arms it `window` from now; later calls inside the window are no-ops and do
//! not push the deadline back. The owner waits on [`until`] with the current
//! [`deadline`](RefreshCoalescer::deadline) and calls
//! [`take_due`](RefreshCoalescer::take_due) when it elapses, which disarms
//! the slot and tells it to run exactly one refresh.
//!
//! ```text
//!  schedule ─┬─ schedule ── schedule ──────────┐
//!            │◄──────────── window ───────────►│ take_due → refresh
//!            armed                             disarmed
//! ```

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::trace;

#[derive(Debug)]
pub struct RefreshCoalescer {
    window: Duration,
    deadline: Option<Instant>,
}

impl RefreshCoalescer {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    /// Arm the slot unless it already is. Returns true if this call armed it.
    pub fn schedule(&mut self) -> bool {
        if self.deadline.is_some() {
            trace!("refresh already pending, coalescing");
            return false;
        }
        self.deadline = Some(Instant::now() + self.window);
        true
    }

    /// Disarm without refreshing. Returns true if a refresh was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed at `now`.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Resolve at `deadline`, or never when there is none.
pub async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
