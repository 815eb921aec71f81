//! Typed identifiers for projects and work items.
//!
//! The server hands out work item ids as UUID text. The client never
//! interprets them, so [`WorkItemId`] is an opaque string newtype ordered
//! lexically. [`ProjectScope`] is the normalized project slug (uppercase
//! ASCII letters, digits and single inner hyphens) and [`DisplayKey`] is the
//! human-facing `SLUG-n` form shown on cards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::TypeError;

/// Opaque server identity of a work item.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkItemId(String);

impl WorkItemId {
    /// Wrap a server id. Surrounding whitespace is trimmed; empty ids are rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidWorkItemId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines only.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl TryFrom<String> for WorkItemId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkItemId> for String {
    fn from(id: WorkItemId) -> String {
        id.0
    }
}

impl FromStr for WorkItemId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkItemId({})", self.short())
    }
}

/// The active project board. All entity and subscription state is
/// partitioned by scope.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectScope(String);

impl ProjectScope {
    /// Normalize a slug: trim, uppercase, then validate.
    ///
    /// Accepts ASCII letters, digits and `-`; rejects leading, trailing or
    /// doubled hyphens.
    pub fn parse(slug: &str) -> Result<Self, TypeError> {
        let candidate = slug.trim().to_ascii_uppercase();
        if candidate.is_empty() {
            return Err(TypeError::EmptySlug);
        }
        if candidate.starts_with('-') || candidate.ends_with('-') || candidate.contains("--") {
            return Err(TypeError::InvalidSlug(slug.to_string()));
        }
        if !candidate
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(TypeError::InvalidSlug(slug.to_string()));
        }
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display key for the `number`th work item in this project.
    pub fn display_key(&self, number: u64) -> DisplayKey {
        DisplayKey {
            scope: self.clone(),
            number,
        }
    }
}

impl TryFrom<String> for ProjectScope {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectScope> for String {
    fn from(scope: ProjectScope) -> String {
        scope.0
    }
}

impl FromStr for ProjectScope {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectScope({})", self.0)
    }
}

/// Human key of a work item: `SLUG-n`, with `n` starting at 1.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayKey {
    scope: ProjectScope,
    number: u64,
}

impl DisplayKey {
    /// Parse `SLUG-n`. The number is split off at the last hyphen so slugs
    /// containing hyphens still parse; leading zeros and zero are rejected.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidDisplayKey(value.to_string());
        let (slug, number) = value.trim().rsplit_once('-').ok_or_else(invalid)?;
        if number.is_empty() || number.starts_with('0') {
            return Err(invalid());
        }
        let number: u64 = number.parse().map_err(|_| invalid())?;
        if slug.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(invalid());
        }
        let scope = ProjectScope::parse(slug).map_err(|_| invalid())?;
        Ok(Self { scope, number })
    }

    /// The project this key belongs to.
    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

impl TryFrom<String> for DisplayKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DisplayKey> for String {
    fn from(key: DisplayKey) -> String {
        key.to_string()
    }
}

impl fmt::Display for DisplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.scope, self.number)
    }
}

impl fmt::Debug for DisplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayKey({self})")
    }
}
