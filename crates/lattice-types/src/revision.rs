//! Spec-section revisions and line diffs between them.

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// The fixed sections of a project spec document.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpecSection {
    Overview,
    Requirements,
    Architecture,
    TechnicalDesign,
    OpenDecisions,
    References,
}

impl SpecSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecSection::Overview => "overview",
            SpecSection::Requirements => "requirements",
            SpecSection::Architecture => "architecture",
            SpecSection::TechnicalDesign => "technical_design",
            SpecSection::OpenDecisions => "open_decisions",
            SpecSection::References => "references",
        }
    }
}

impl std::fmt::Display for SpecSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One saved revision of a spec section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRevision {
    pub id: String,
    pub section: SpecSection,
    pub content: String,
    #[serde(default)]
    pub edited_by: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Context,
    Added,
    Removed,
}

/// One aligned line. Line numbers are 1-based and `None` on the side the
/// line does not exist on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
}

impl DiffLine {
    pub fn context(text: impl Into<String>, old_line: usize, new_line: usize) -> Self {
        Self {
            kind: DiffKind::Context,
            text: text.into(),
            old_line: Some(old_line),
            new_line: Some(new_line),
        }
    }

    pub fn added(text: impl Into<String>, new_line: usize) -> Self {
        Self {
            kind: DiffKind::Added,
            text: text.into(),
            old_line: None,
            new_line: Some(new_line),
        }
    }

    pub fn removed(text: impl Into<String>, old_line: usize) -> Self {
        Self {
            kind: DiffKind::Removed,
            text: text.into(),
            old_line: Some(old_line),
            new_line: None,
        }
    }
}

/// Summary counts of a diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub context: usize,
    pub added: usize,
    pub removed: usize,
}

/// Ordered alignment of two revisions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionDiff(Vec<DiffLine>);

impl RevisionDiff {
    pub fn new(lines: Vec<DiffLine>) -> Self {
        Self(lines)
    }

    pub fn lines(&self) -> &[DiffLine] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffLine> {
        self.0.iter()
    }

    /// True when any line was added or removed.
    pub fn has_changes(&self) -> bool {
        self.0.iter().any(|l| l.kind != DiffKind::Context)
    }

    pub fn stats(&self) -> DiffStats {
        self.0.iter().fold(DiffStats::default(), |mut acc, line| {
            match line.kind {
                DiffKind::Context => acc.context += 1,
                DiffKind::Added => acc.added += 1,
                DiffKind::Removed => acc.removed += 1,
            }
            acc
        })
    }
}

impl<'a> IntoIterator for &'a RevisionDiff {
    type Item = &'a DiffLine;
    type IntoIter = std::slice::Iter<'a, DiffLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
