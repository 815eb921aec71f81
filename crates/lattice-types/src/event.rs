//! Live push events.
//!
//! The server pushes one named message per recorded project event. The
//! message name is the action, and its `data` field is a JSON object:
//!
//! ```json
//! {
//!   "id": "…", "project": "LAT", "task_id": "…", "task_number": 4,
//!   "task_display_key": "LAT-4", "action": "task.moved", "actor": "human",
//!   "detail": { "from_status": "backlog", "to_status": "done" },
//!   "created_at": "…"
//! }
//! ```
//!
//! Decoding is total: anything that does not fit this shape, names an action
//! outside [`EventAction`], or carries an invalid scope yields `None`. The
//! caller drops it.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use strum::EnumString;

use crate::ids::{DisplayKey, ProjectScope, WorkItemId};

/// Closed set of action kinds the board listens for.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EnumString)]
pub enum EventAction {
    #[strum(serialize = "task.created")]
    TaskCreated,
    #[strum(serialize = "task.updated")]
    TaskUpdated,
    #[strum(serialize = "task.moved")]
    TaskMoved,
    #[strum(serialize = "task.deleted")]
    TaskDeleted,
    #[strum(serialize = "task.review_state_changed")]
    TaskReviewStateChanged,
    #[strum(serialize = "question.created")]
    QuestionCreated,
    #[strum(serialize = "question.resolved")]
    QuestionResolved,
    #[strum(serialize = "spec.updated")]
    SpecUpdated,
    #[strum(serialize = "goal.updated")]
    GoalUpdated,
    #[strum(serialize = "subtask.created")]
    SubtaskCreated,
    #[strum(serialize = "subtask.updated")]
    SubtaskUpdated,
    #[strum(serialize = "subtask.deleted")]
    SubtaskDeleted,
    #[strum(serialize = "attachment.created")]
    AttachmentCreated,
    #[strum(serialize = "attachment.deleted")]
    AttachmentDeleted,
}

impl EventAction {
    /// Every action, in wire-registration order.
    pub const ALL: [EventAction; 14] = [
        EventAction::TaskCreated,
        EventAction::TaskUpdated,
        EventAction::TaskMoved,
        EventAction::TaskDeleted,
        EventAction::TaskReviewStateChanged,
        EventAction::QuestionCreated,
        EventAction::QuestionResolved,
        EventAction::SpecUpdated,
        EventAction::GoalUpdated,
        EventAction::SubtaskCreated,
        EventAction::SubtaskUpdated,
        EventAction::SubtaskDeleted,
        EventAction::AttachmentCreated,
        EventAction::AttachmentDeleted,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::TaskCreated => "task.created",
            EventAction::TaskUpdated => "task.updated",
            EventAction::TaskMoved => "task.moved",
            EventAction::TaskDeleted => "task.deleted",
            EventAction::TaskReviewStateChanged => "task.review_state_changed",
            EventAction::QuestionCreated => "question.created",
            EventAction::QuestionResolved => "question.resolved",
            EventAction::SpecUpdated => "spec.updated",
            EventAction::GoalUpdated => "goal.updated",
            EventAction::SubtaskCreated => "subtask.created",
            EventAction::SubtaskUpdated => "subtask.updated",
            EventAction::SubtaskDeleted => "subtask.deleted",
            EventAction::AttachmentCreated => "attachment.created",
            EventAction::AttachmentDeleted => "attachment.deleted",
        }
    }

    /// The incremental change this action implies for its subject, if any.
    ///
    /// Only work item deletion and question bookkeeping are modelled; every
    /// other field change waits for the next full refresh.
    pub fn delta(&self) -> Delta {
        match self {
            EventAction::TaskDeleted => Delta::RemoveSubject,
            EventAction::QuestionCreated => Delta::IncrementCounter,
            EventAction::QuestionResolved => Delta::DecrementCounter,
            _ => Delta::None,
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incremental effect of an event on the local store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delta {
    /// Drop the subject work item and its counters.
    RemoveSubject,
    /// Open-question count +1.
    IncrementCounter,
    /// Open-question count −1, floored at zero.
    DecrementCounter,
    /// Nothing incremental; refresh only.
    None,
}

/// A decoded push event.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveEvent {
    /// Server event id, used only for logging.
    pub id: Option<String>,
    /// Originating project.
    pub scope: ProjectScope,
    pub action: EventAction,
    /// Work item the event is about, when there is one.
    pub subject_id: Option<WorkItemId>,
    pub display_key: Option<DisplayKey>,
    pub actor: Option<String>,
    /// Opaque per-action payload.
    pub detail: Value,
}

#[derive(Deserialize)]
struct WirePayload {
    #[serde(default)]
    id: Option<String>,
    project: String,
    action: String,
    #[serde(default, alias = "task_id")]
    subject_id: Option<String>,
    #[serde(default, alias = "task_display_key")]
    display_key: Option<String>,
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    detail: Value,
}

impl LiveEvent {
    /// Decode the `data` field of a named push message.
    ///
    /// `event_name` is the message name; when present it must agree with the
    /// payload's action. Returns `None` for anything malformed.
    pub fn decode(event_name: Option<&str>, data: &str) -> Option<Self> {
        let wire: WirePayload = serde_json::from_str(data).ok()?;
        let action = EventAction::parse(&wire.action)?;
        if let Some(name) = event_name.filter(|n| !n.is_empty() && *n != "message")
            && name != action.as_str()
        {
            return None;
        }
        let scope = ProjectScope::parse(&wire.project).ok()?;
        // A present-but-invalid subject is malformed; an absent one is fine.
        let subject_id = match wire.subject_id {
            Some(raw) => Some(WorkItemId::new(raw).ok()?),
            None => None,
        };
        let display_key = wire.display_key.and_then(|k| DisplayKey::parse(&k).ok());

        Some(Self {
            id: wire.id,
            scope,
            action,
            subject_id,
            display_key,
            actor: wire.actor,
            detail: wire.detail,
        })
    }

    pub fn delta(&self) -> Delta {
        self.action.delta()
    }
}
