// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshots of a folder's files for adapters without their own history.
//!
//! A [`Manifest`] records size and modification time per path. Comparing the
//! manifest saved after the last sync with a fresh scan answers "are there
//! local changes", and the difference becomes the change list of a
//! transfer log entry.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Local};
use drift_core::{Change, ChangeType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ignore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub size: u64,
    /// Seconds since the epoch; zero for folders.
    pub modified: i64,
    #[serde(default)]
    pub is_dir: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    entries: BTreeMap<String, Entry>,
}

impl Manifest {
    /// Scans `root`, skipping excluded top-level names and ignored files.
    pub fn scan(root: &Path, excludes: &[String]) -> std::io::Result<Manifest> {
        let mut manifest = Manifest::default();
        scan_dir(root, "", excludes, &mut manifest.entries)?;
        Ok(manifest)
    }

    /// Loads a saved manifest; a missing or unreadable file yields `None`.
    pub fn load(path: &Path) -> Option<Manifest> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Content hash of the listing; equal trees give equal revisions.
    pub fn revision(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, entry) in &self.entries {
            hasher.update(format!("{} {} {}\n", path, entry.size, entry.modified).as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Changes that turn `self` into `newer`.
    pub fn diff(&self, newer: &Manifest, timestamp: DateTime<Local>) -> Vec<Change> {
        let mut changes = Vec::new();
        for (path, entry) in &newer.entries {
            let change = match self.entries.get(path) {
                None => Some(ChangeType::Added),
                Some(old) if !entry.is_dir && old != entry => Some(ChangeType::Edited),
                Some(_) => None,
            };
            if let Some(change_type) = change {
                changes.push(make_change(path, change_type, entry.is_dir, timestamp));
            }
        }
        for (path, entry) in &self.entries {
            if !newer.entries.contains_key(path) {
                changes.push(make_change(path, ChangeType::Deleted, entry.is_dir, timestamp));
            }
        }
        changes
    }

    /// Takes over `after`'s entry for every path that differs between
    /// `before` and `after`, leaving everything else untouched.
    pub fn apply(&mut self, before: &Manifest, after: &Manifest) {
        for (path, entry) in &after.entries {
            if before.entries.get(path) != Some(entry) {
                self.entries.insert(path.clone(), *entry);
            }
        }
        for path in before.entries.keys() {
            if !after.entries.contains_key(path) {
                self.entries.remove(path);
            }
        }
    }
}

fn make_change(path: &str, change_type: ChangeType, is_dir: bool, at: DateTime<Local>) -> Change {
    let change = Change::new(path, change_type, at);
    if is_dir {
        change.folder()
    } else {
        change
    }
}

fn scan_dir(
    dir: &Path,
    prefix: &str,
    excludes: &[String],
    out: &mut BTreeMap<String, Entry>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if prefix.is_empty() && excludes.iter().any(|e| *e == name) {
            continue;
        }
        if ignore::is_ignored(&name) {
            continue;
        }
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        let meta = entry.metadata()?;
        if meta.is_dir() {
            out.insert(
                rel.clone(),
                Entry {
                    size: 0,
                    modified: 0,
                    is_dir: true,
                },
            );
            scan_dir(&entry.path(), &rel, excludes, out)?;
        } else {
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or_default();
            out.insert(
                rel,
                Entry {
                    size: meta.len(),
                    modified,
                    is_dir: false,
                },
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
