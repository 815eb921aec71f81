//! Board sync core for Lattice clients.
//!
//! Keeps a local copy of one project's board consistent with the server while
//! the user moves work items optimistically and other actors change the board
//! concurrently.
//!
//! - [`EntityStore`] is the local projection: work items by id plus
//!   open-question counters.
//! - [`MutationExecutor`] applies moves before the server confirms them and
//!   rolls back on rejection.
//! - [`EventSubscriber`] owns the live feed and projects deletions and
//!   question counts immediately.
//! - [`RefreshCoalescer`] collapses bursts of change signals into one full
//!   refresh per quiet window.
//! - [`diff()`] aligns two revisions of a spec section line by line.
//!
//! The pieces are driven by the board actor behind [`BoardHandle`]; see
//! [`spawn_board`]. The server itself sits behind [`BoardTransport`].

pub mod actor;
pub mod coalescer;
pub mod config;
pub mod constants;
pub mod diff;
pub mod mutation;
pub mod projector;
pub mod store;
pub mod subscriptions;
pub mod transport;

pub use actor::{BoardError, BoardHandle, BoardSnapshot, spawn_board};
pub use coalescer::RefreshCoalescer;
pub use config::{ConfigError, SyncConfig};
pub use diff::{compare_with_previous, diff};
pub use mutation::{MoveOutcome, MutationExecutor, PendingMove};
pub use projector::{Projection, project};
pub use store::{AuxiliaryCounter, EntityStore, StageCounts};
pub use subscriptions::{Dispatch, EventSubscriber, FeedEnvelope, SubscriptionState};
pub use transport::{BoardTransport, FeedSignal, LiveFeed, TransportError};
