//! Line diff between two revisions of a spec section.
//!
//! Greedy alignment with single-line lookahead, linear in the number of
//! lines. It recovers single inserted or removed lines; larger block edits
//! fall through to paired replace lines and the result is not a minimal edit
//! script. Callers rely on this exact output, so it is not an LCS.

use lattice_types::{DiffLine, RevisionDiff, SpecRevision};

/// Split text into lines after folding `\r\n` and `\r` into `\n`.
/// Empty text has no lines.
fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Align `previous` against `current`.
pub fn diff(previous: &str, current: &str) -> RevisionDiff {
    let old = split_lines(previous);
    let new = split_lines(current);

    let mut lines = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0usize, 0usize);
    // Last assigned number per side; numbers are 1-based.
    let (mut old_no, mut new_no) = (0usize, 0usize);

    while i < old.len() || j < new.len() {
        let old_line = old.get(i);
        let new_line = new.get(j);

        if old_line.is_some() && old_line == new_line {
            old_no += 1;
            new_no += 1;
            lines.push(DiffLine::context(new[j].as_str(), old_no, new_no));
            i += 1;
            j += 1;
        } else if old_line.is_some() && new_line.is_some() && new.get(j + 1) == old_line {
            new_no += 1;
            lines.push(DiffLine::added(new[j].as_str(), new_no));
            j += 1;
        } else if old_line.is_some() && new_line.is_some() && old.get(i + 1) == new_line {
            old_no += 1;
            lines.push(DiffLine::removed(old[i].as_str(), old_no));
            i += 1;
        } else {
            if let Some(text) = old_line {
                old_no += 1;
                lines.push(DiffLine::removed(text.as_str(), old_no));
                i += 1;
            }
            if let Some(text) = new_line {
                new_no += 1;
                lines.push(DiffLine::added(text.as_str(), new_no));
                j += 1;
            }
        }
    }

    RevisionDiff::new(lines)
}

/// Diff a revision against the one saved before it.
///
/// `history` is newest first, as the server returns it. The oldest revision
/// is compared with empty text. Returns `None` if `revision_id` is unknown.
pub fn compare_with_previous(history: &[SpecRevision], revision_id: &str) -> Option<RevisionDiff> {
    let index = history.iter().position(|r| r.id == revision_id)?;
    let previous = history.get(index + 1).map_or("", |r| r.content.as_str());
    Some(diff(previous, &history[index].content))
}
