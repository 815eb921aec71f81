//! Shared board types for Lattice clients.
//!
//! This crate is the leaf of the client workspace: typed identifiers, work
//! items, live-event payloads and spec-section revisions. It has **no internal
//! lattice dependencies** and performs no I/O.
//!
//! # Entity Overview
//!
//! ```text
//! Project (ProjectScope) ← the board a client is looking at
//!     └── WorkItem (WorkItemId + DisplayKey "SLUG-n")
//!     │       └── Stage: backlog → ready → in_progress → review → done
//!     │       └── open question count (client-side counter)
//!     └── SpecSection (overview, requirements, ...)
//!             └── SpecRevision history (newest first)
//!
//! LiveEvent ← server push, scoped to one project
//!     └── EventAction (closed set) + optional subject WorkItemId
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`ProjectScope`]  | Normalized project slug, partitions state    |
//! | [`WorkItemId`]    | Opaque server identity of a work item        |
//! | [`DisplayKey`]    | Human key, `SLUG-n`                          |
//! | [`WorkItem`]      | Server-owned board card                      |
//! | [`Stage`]         | Ordered board column                         |
//! | [`LiveEvent`]     | Decoded push event                           |
//! | [`RevisionDiff`]  | Line alignment between two revisions         |
//! |-------------------|----------------------------------------------|

pub mod event;
pub mod ids;
pub mod item;
pub mod revision;

pub use event::{Delta, EventAction, LiveEvent};
pub use ids::{DisplayKey, ProjectScope, WorkItemId};
pub use item::{Priority, ReviewState, Stage, SubjectCount, WorkItem};
pub use revision::{DiffKind, DiffLine, DiffStats, RevisionDiff, SpecRevision, SpecSection};

/// Errors from parsing wire values into typed values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("project slug cannot be empty")]
    EmptySlug,
    #[error("invalid project slug '{0}'")]
    InvalidSlug(String),
    #[error("invalid display key '{0}'")]
    InvalidDisplayKey(String),
    #[error("invalid work item id '{0}'")]
    InvalidWorkItemId(String),
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
