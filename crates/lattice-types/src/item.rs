//! Work items and their board stages.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator};

use crate::TypeError;
use crate::ids::{DisplayKey, ProjectScope, WorkItemId};

/// Board column a work item sits in. Variant order is board order.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
    EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Stage {
    #[default]
    Backlog,
    Ready,
    #[strum(serialize = "in_progress", serialize = "in-progress")]
    InProgress,
    Review,
    Done,
}

impl Stage {
    /// Parse a wire name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        <Self as FromStr>::from_str(s).map_err(|_| TypeError::UnknownVariant {
            kind: "stage",
            value: s.to_string(),
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Backlog => "backlog",
            Stage::Ready => "ready",
            Stage::InProgress => "in_progress",
            Stage::Review => "review",
            Stage::Done => "done",
        }
    }

    /// Zero-based column index.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// All stages in board order.
    pub fn all() -> impl Iterator<Item = Stage> {
        Stage::iter()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a work item is ready to be picked up by an agent.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReviewState {
    #[default]
    Ready,
    NotReady,
}

#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A server-owned board card.
///
/// `sort_order` only orders items relative to each other inside one stage.
/// It is not unique; [`WorkItem::board_cmp`] breaks ties by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub display_key: DisplayKey,
    pub task_number: u64,
    pub title: String,
    #[serde(rename = "status")]
    pub stage: Stage,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub review_state: ReviewState,
    pub sort_order: f64,
    #[serde(default)]
    pub updated_at: String,
}

impl WorkItem {
    /// Minimal constructor; optional fields take their defaults.
    pub fn new(
        id: WorkItemId,
        display_key: DisplayKey,
        title: impl Into<String>,
        stage: Stage,
        sort_order: f64,
    ) -> Self {
        Self {
            task_number: display_key.number(),
            id,
            display_key,
            title: title.into(),
            stage,
            priority: Priority::default(),
            review_state: ReviewState::default(),
            sort_order,
            updated_at: String::new(),
        }
    }

    /// Owning project, taken from the display key.
    pub fn scope(&self) -> &ProjectScope {
        self.display_key.scope()
    }

    /// Board order: stage, then sort position, then id.
    ///
    /// `f64::total_cmp` keeps this a total order even for NaN positions.
    pub fn board_cmp(&self, other: &Self) -> Ordering {
        self.stage
            .cmp(&other.stage)
            .then_with(|| self.sort_order.total_cmp(&other.sort_order))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Open auxiliary records (e.g. unresolved questions) attached to one work item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectCount {
    #[serde(alias = "task_id")]
    pub subject_id: WorkItemId,
    pub count: u32,
}
