// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync state kept by adapters whose tool has no history of its own.
//!
//! Everything lives under `.drift/` in the folder: the manifest of the last
//! synced tree, the transfer journal, the unsynced flag and the exclude
//! rules handed to the tool.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use drift_core::{ChangeSet, User};

use super::ignore;
use super::journal::Journal;
use super::manifest::Manifest;
use super::{write_flag, STATE_DIR_NAME, UNSYNCED_FLAG_NAME};

const MANIFEST_FILE: &str = "manifest.json";
const EXCLUDE_FILE: &str = "exclude";

#[derive(Debug, Clone)]
pub struct MirrorState {
    root: PathBuf,
    dir: PathBuf,
    excludes: Vec<String>,
    journal: Journal,
}

impl MirrorState {
    /// State for `root`, with the journal stored as `<journal_name>`.
    pub fn new(root: &Path, journal_name: &str) -> Self {
        let dir = root.join(STATE_DIR_NAME);
        MirrorState {
            root: root.to_path_buf(),
            journal: Journal::new(dir.join(journal_name)),
            dir,
            excludes: vec![STATE_DIR_NAME.to_string()],
        }
    }

    /// Also skips the top-level entry `name`.
    pub fn exclude(mut self, name: &str) -> Self {
        self.excludes.push(name.to_string());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Manifest of the last synced tree; empty before the first sync.
    pub fn stored(&self) -> Manifest {
        Manifest::load(&self.dir.join(MANIFEST_FILE)).unwrap_or_default()
    }

    pub fn scan(&self) -> std::io::Result<Manifest> {
        Manifest::scan(&self.root, &self.excludes)
    }

    pub fn save(&self, manifest: &Manifest) -> std::io::Result<()> {
        manifest.save(&self.dir.join(MANIFEST_FILE))
    }

    /// Revision of the last synced tree.
    pub fn revision(&self) -> Option<String> {
        Manifest::load(&self.dir.join(MANIFEST_FILE)).map(|m| m.revision())
    }

    pub fn has_local_changes(&self) -> bool {
        match self.scan() {
            Ok(current) => !self.stored().diff(&current, Local::now()).is_empty(),
            Err(_) => false,
        }
    }

    pub fn has_unsynced(&self) -> bool {
        self.dir.join(UNSYNCED_FLAG_NAME).exists()
    }

    pub fn set_unsynced(&self, value: bool) -> std::io::Result<()> {
        write_flag(&self.dir.join(UNSYNCED_FLAG_NAME), value)
    }

    /// Writes the shared ignore rules for the tool and returns their path.
    pub fn write_rules(&self) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(EXCLUDE_FILE);
        fs::write(&path, ignore::rules_file())?;
        Ok(path)
    }

    /// Records a finished upload of `sent` by `user` and makes it the
    /// synced baseline.
    pub fn record_upload(&self, user: &User, sent: &Manifest) -> std::io::Result<()> {
        let now = Local::now();
        let mut entry = ChangeSet::new(sent.revision(), user.clone(), now);
        entry.changes = self.stored().diff(sent, now);
        self.journal.append(&entry)?;
        self.save(sent)
    }

    /// Records a finished download that turned `before` into `after`.
    ///
    /// Only paths the download touched enter the baseline, so local edits
    /// made before it still count as local changes.
    pub fn record_download(
        &self,
        author: &User,
        before: &Manifest,
        after: &Manifest,
    ) -> std::io::Result<()> {
        let mut stored = self.stored();
        stored.apply(before, after);
        let now = Local::now();
        let mut entry = ChangeSet::new(stored.revision(), author.clone(), now);
        entry.changes = before.diff(after, now);
        self.journal.append(&entry)?;
        self.save(&stored)
    }
}

#[cfg(test)]
#[path = "mirror_tests.rs"]
mod tests;
