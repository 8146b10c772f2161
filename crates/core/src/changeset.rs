// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Change sets: the canonical form of a commit or transfer.
//!
//! Every adapter translates its own history format into [`ChangeSet`]s.
//! For display, [`group_change_sets`] folds entries by the same author on the
//! same calendar day into a single entry.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Author of a change set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        User {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Kind of change applied to a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Edited,
    Deleted,
    Moved,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Edited => "edited",
            ChangeType::Deleted => "deleted",
            ChangeType::Moved => "moved",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "added" => Ok(ChangeType::Added),
            "edited" => Ok(ChangeType::Edited),
            "deleted" => Ok(ChangeType::Deleted),
            "moved" => Ok(ChangeType::Moved),
            _ => Err(Error::InvalidChangeType(s.to_string())),
        }
    }
}

/// A change to one path, relative to the folder root with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub change_type: ChangeType,
    /// Destination path, only set for [`ChangeType::Moved`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to_path: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
    pub timestamp: DateTime<Local>,
}

impl Change {
    pub fn new(path: impl Into<String>, change_type: ChangeType, timestamp: DateTime<Local>) -> Self {
        Change {
            path: path.into(),
            change_type,
            moved_to_path: None,
            is_folder: false,
            timestamp,
        }
    }

    pub fn moved(
        from: impl Into<String>,
        to: impl Into<String>,
        timestamp: DateTime<Local>,
    ) -> Self {
        Change {
            path: from.into(),
            change_type: ChangeType::Moved,
            moved_to_path: Some(to.into()),
            is_folder: false,
            timestamp,
        }
    }

    /// Marks the change as applying to a folder.
    pub fn folder(mut self) -> Self {
        self.is_folder = true;
        self
    }
}

/// One commit or transfer, possibly merged from several for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub revision: String,
    pub user: User,
    pub timestamp: DateTime<Local>,
    /// Earliest timestamp when several change sets were merged into this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_timestamp: Option<DateTime<Local>>,
    #[serde(default)]
    pub changes: Vec<Change>,
    /// Display name of the folder the change set belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

impl ChangeSet {
    pub fn new(revision: impl Into<String>, user: User, timestamp: DateTime<Local>) -> Self {
        ChangeSet {
            revision: revision.into(),
            user,
            timestamp,
            first_timestamp: None,
            changes: Vec::new(),
            folder: None,
            remote_url: None,
        }
    }

    /// Local calendar day of the change set.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// True when every change touches `path` and nothing else.
    ///
    /// An empty change list is not considered to touch anything.
    pub fn only_touches(&self, path: &str) -> bool {
        !self.changes.is_empty() && self.changes.iter().all(|c| c.path == path)
    }

    /// Folds an older change set into this one.
    fn absorb(&mut self, older: ChangeSet) {
        let older_first = older.first_timestamp.unwrap_or(older.timestamp);
        let self_first = self.first_timestamp.unwrap_or(self.timestamp);
        self.first_timestamp = Some(self_first.min(older_first));
        if older.timestamp > self.timestamp {
            self.timestamp = older.timestamp;
            self.revision = older.revision;
        }
        self.changes.extend(older.changes);
    }
}

/// Sorts change sets newest first and merges entries by the same author on
/// the same local calendar day.
///
/// The merged entry keeps the newest revision, takes the latest timestamp as
/// `timestamp` and the earliest as `first_timestamp`, and lists the newer
/// entry's changes first.
pub fn group_change_sets(mut change_sets: Vec<ChangeSet>) -> Vec<ChangeSet> {
    change_sets.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut grouped: Vec<ChangeSet> = Vec::with_capacity(change_sets.len());
    // Entries of one day are contiguous once sorted, so only the tail of
    // `grouped` that shares the current day is searched.
    let mut day_start = 0;

    for change_set in change_sets {
        let day = change_set.day();
        if grouped.last().is_some_and(|last| last.day() != day) {
            day_start = grouped.len();
        }

        let existing = grouped[day_start..]
            .iter_mut()
            .find(|entry| entry.user == change_set.user);

        match existing {
            Some(entry) => entry.absorb(change_set),
            None => grouped.push(change_set),
        }
    }

    grouped
}

#[cfg(test)]
#[path = "changeset_tests.rs"]
mod tests;
