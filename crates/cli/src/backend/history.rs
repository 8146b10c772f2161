// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for name-status style history output.
//!
//! Both the git and hg adapters ask their tool for the same line format:
//!
//! ```text
//! commit<TAB><revision><TAB><author name><TAB><author email><TAB><date>
//! A<TAB>added/path
//! M<TAB>edited/path
//! D<TAB>deleted/path
//! R100<TAB>old/path<TAB>new/path
//! ```
//!
//! Dates use the `YYYY-MM-DD HH:MM:SS +ZZZZ` form and are converted to the
//! local time zone. Placeholder files that keep empty folders alive are
//! reported as changes to the folder itself.

use chrono::{DateTime, Local};
use drift_core::{Change, ChangeSet, ChangeType, User};

/// Header marker of a commit line.
pub const COMMIT_MARKER: &str = "commit";

/// File placed in otherwise empty folders so the tool tracks them.
pub const EMPTY_FOLDER_PLACEHOLDER: &str = ".empty";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Parses a tool date into the local time zone.
pub fn parse_date(s: &str) -> Option<DateTime<Local>> {
    let s = s.trim();
    DateTime::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|d| d.with_timezone(&Local))
}

/// Parses history lines into change sets, in output order.
pub fn parse_log<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<ChangeSet> {
    let mut change_sets: Vec<ChangeSet> = Vec::new();

    for line in lines {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.first() == Some(&COMMIT_MARKER) {
            if let Some(cs) = parse_header(&fields) {
                change_sets.push(cs);
            }
            continue;
        }
        let Some(current) = change_sets.last_mut() else {
            continue;
        };
        if let Some(change) = parse_change(&fields, current.timestamp) {
            current.changes.push(change);
        }
    }

    change_sets
}

fn parse_header(fields: &[&str]) -> Option<ChangeSet> {
    if fields.len() < 5 {
        return None;
    }
    let timestamp = parse_date(fields[4])?;
    Some(ChangeSet::new(
        fields[1],
        User::new(fields[2], fields[3]),
        timestamp,
    ))
}

fn parse_change(fields: &[&str], timestamp: DateTime<Local>) -> Option<Change> {
    let code = fields.first()?.chars().next()?;
    let change = match (code, fields.len()) {
        ('A', 2) | ('C', 3) => placeholder_aware(fields[fields.len() - 1], ChangeType::Added, timestamp),
        ('M', 2) | ('T', 2) => Change::new(fields[1], ChangeType::Edited, timestamp),
        ('D', 2) => placeholder_aware(fields[1], ChangeType::Deleted, timestamp),
        ('R', 3) => Change::moved(fields[1], fields[2], timestamp),
        _ => return None,
    };
    // A placeholder at the root stands for nothing.
    (!change.path.is_empty()).then_some(change)
}

fn placeholder_aware(path: &str, change_type: ChangeType, timestamp: DateTime<Local>) -> Change {
    if path == EMPTY_FOLDER_PLACEHOLDER {
        return Change::new("", change_type, timestamp);
    }
    match path.strip_suffix(EMPTY_FOLDER_PLACEHOLDER) {
        Some(folder) if folder.ends_with('/') => {
            Change::new(folder.trim_end_matches('/'), change_type, timestamp).folder()
        }
        _ => Change::new(path, change_type, timestamp),
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
