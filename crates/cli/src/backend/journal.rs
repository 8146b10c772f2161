// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local transfer log for adapters without history.
//!
//! Each completed transfer appends one JSON line holding a [`ChangeSet`].
//! The log is local to the machine: it records what this client sent and
//! received, which is all a mirror tool can know.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use drift_core::ChangeSet;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Journal { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends an entry; entries without changes are not recorded.
    pub fn append(&self, change_set: &ChangeSet) -> std::io::Result<()> {
        if change_set.changes.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(change_set).map_err(std::io::Error::other)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    /// Reads entries newest first, optionally keeping only changes at or
    /// below `path`. Corrupt lines are skipped.
    pub fn read(&self, path: Option<&str>, limit: usize) -> Vec<ChangeSet> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        let lines: Vec<&str> = content.lines().collect();
        let mut entries = Vec::new();
        for (index, line) in lines.into_iter().enumerate().rev() {
            if entries.len() >= limit {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let mut change_set: ChangeSet = match serde_json::from_str(line) {
                Ok(cs) => cs,
                Err(e) => {
                    warn!("skipping corrupt transfer log line {}: {}", index + 1, e);
                    continue;
                }
            };
            if let Some(filter) = path {
                change_set.changes.retain(|c| touches(&c.path, filter));
                if change_set.changes.is_empty() {
                    continue;
                }
            }
            entries.push(change_set);
        }
        entries
    }

    /// Revision of the newest entry.
    pub fn latest_revision(&self) -> Option<String> {
        self.read(None, 1).into_iter().next().map(|cs| cs.revision)
    }
}

fn touches(change_path: &str, filter: &str) -> bool {
    let filter = filter.trim_end_matches('/');
    change_path == filter
        || change_path
            .strip_prefix(filter)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
