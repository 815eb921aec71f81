//! Local projection of the active board.
//!
//! [`EntityStore`] holds the work items and open-question counters of exactly
//! one [`ProjectScope`]. It is plain data: the board actor is its only
//! writer, and readers get clones through published snapshots.

use std::collections::{BTreeMap, HashMap};

use lattice_types::{ProjectScope, Stage, SubjectCount, WorkItem, WorkItemId};

/// Non-negative per-item counter.
///
/// Zero entries are dropped, so a missing key and a zero count read the same.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxiliaryCounter {
    counts: BTreeMap<WorkItemId, u32>,
}

impl AuxiliaryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &WorkItemId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Add one, returning the new count.
    pub fn increment(&mut self, id: &WorkItemId) -> u32 {
        let count = self.counts.entry(id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Subtract one, flooring at zero. Returns the new count.
    pub fn decrement(&mut self, id: &WorkItemId) -> u32 {
        match self.counts.get_mut(id) {
            Some(count) if *count > 1 => {
                *count -= 1;
                *count
            }
            Some(_) => {
                self.counts.remove(id);
                0
            }
            None => 0,
        }
    }

    /// Drop a key entirely, returning its last count.
    pub fn remove(&mut self, id: &WorkItemId) -> u32 {
        self.counts.remove(id).unwrap_or(0)
    }

    /// Replace all counts. Duplicate subjects are summed.
    pub fn replace<I>(&mut self, counts: I)
    where
        I: IntoIterator<Item = SubjectCount>,
    {
        self.counts.clear();
        for SubjectCount { subject_id, count } in counts {
            if count == 0 {
                continue;
            }
            let entry = self.counts.entry(subject_id).or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| u64::from(c)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkItemId, u32)> {
        self.counts.iter().map(|(id, &count)| (id, count))
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Number of work items per stage, in board order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageCounts([usize; 5]);

impl StageCounts {
    pub fn get(&self, stage: Stage) -> usize {
        self.0[stage.index()]
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

/// Work items and counters of one project scope.
#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    scope: Option<ProjectScope>,
    items: HashMap<WorkItemId, WorkItem>,
    open_questions: AuxiliaryCounter,
    /// Bumped on every write; lets readers skip redraws.
    version: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and rebind to `scope` (or to nothing).
    pub fn reset(&mut self, scope: Option<ProjectScope>) {
        self.scope = scope;
        self.items.clear();
        self.open_questions.clear();
        self.bump();
    }

    pub fn scope(&self) -> Option<&ProjectScope> {
        self.scope.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, id: &WorkItemId) -> Option<&WorkItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &WorkItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn open_questions(&self) -> &AuxiliaryCounter {
        &self.open_questions
    }

    pub fn open_question_count(&self, id: &WorkItemId) -> u32 {
        self.open_questions.get(id)
    }

    /// Insert or replace a work item wholesale.
    pub fn upsert(&mut self, item: WorkItem) -> Option<WorkItem> {
        let previous = self.items.insert(item.id.clone(), item);
        self.bump();
        previous
    }

    /// Set a tracked item's stage, returning the stage it had.
    pub fn set_stage(&mut self, id: &WorkItemId, stage: Stage) -> Option<Stage> {
        let item = self.items.get_mut(id)?;
        let previous = std::mem::replace(&mut item.stage, stage);
        self.bump();
        Some(previous)
    }

    /// Remove an item and purge its counters.
    pub fn remove(&mut self, id: &WorkItemId) -> Option<WorkItem> {
        let removed = self.items.remove(id);
        let purged = self.open_questions.remove(id);
        if removed.is_some() || purged > 0 {
            self.bump();
        }
        removed
    }

    pub fn increment_open_questions(&mut self, id: &WorkItemId) -> u32 {
        let count = self.open_questions.increment(id);
        self.bump();
        count
    }

    pub fn decrement_open_questions(&mut self, id: &WorkItemId) -> u32 {
        let count = self.open_questions.decrement(id);
        self.bump();
        count
    }

    /// Replace items and counters with a full refresh result.
    pub fn replace_all<I, C>(&mut self, items: I, counts: C)
    where
        I: IntoIterator<Item = WorkItem>,
        C: IntoIterator<Item = SubjectCount>,
    {
        self.items = items.into_iter().map(|item| (item.id.clone(), item)).collect();
        self.open_questions.replace(counts);
        self.bump();
    }

    /// Items of one stage in board order: (sort position, id).
    pub fn column(&self, stage: Stage) -> Vec<&WorkItem> {
        let mut column: Vec<_> = self.items.values().filter(|i| i.stage == stage).collect();
        column.sort_by(|a, b| a.board_cmp(b));
        column
    }

    /// Every stage with its ordered items, in board order.
    pub fn columns(&self) -> Vec<(Stage, Vec<&WorkItem>)> {
        Stage::all().map(|stage| (stage, self.column(stage))).collect()
    }

    pub fn stage_counts(&self) -> StageCounts {
        let mut counts = [0usize; 5];
        for item in self.items.values() {
            counts[item.stage.index()] += 1;
        }
        StageCounts(counts)
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
