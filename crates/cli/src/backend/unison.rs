// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Unison two-way adapter.
//!
//! Every sync is bidirectional. A dry run lists what would propagate;
//! paths changed on both replicas go through the conflict resolver before
//! the real run, so unison itself never has to skip anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use drift_core::{ChangeSet, ErrorStatus, StorageType, User};
use regex::Regex;
use tracing::{debug, info};

use super::ignore::IGNORE_RULES;
use super::mirror::MirrorState;
use super::process::{ToolCommand, ToolOutput};
use super::progress::{parse_percentage, parse_speed};
use super::{
    tree_size, Backend, BackendOptions, Bootstrap, Fetch, SyncContext, SyncFailure, SyncResult,
    STATE_DIR_NAME,
};
use crate::conflict::{self, Conflict, ConflictReplicas, PendingChange};
use crate::error::{Error, Result};

const JOURNAL_FILE: &str = "unison.log";
const ARCHIVE_DIR: &str = "unison";

static PLAN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(
        r"^\s*(new file|new dir|changed|deleted|props)?\s*(---->|<----|<-\?->|<-M->|<==>)\s*(new file|new dir|changed|deleted|props)?\s+(\S.*?)\s*$",
    ) {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    }
});

/// One line of a dry-run plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    /// Local change to send.
    Send(String),
    /// Remote change to receive.
    Receive(String),
    /// Changed on both sides: `(path, local status, remote status)`.
    Conflict(String, String, String),
}

/// Parses the itemized plan unison prints in batch mode.
pub fn parse_plan<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<PlannedAction> {
    lines
        .into_iter()
        .filter_map(|line| {
            let caps = PLAN_LINE.captures(line)?;
            let status = |i: usize| caps.get(i).map_or("", |m| m.as_str()).to_string();
            let path = status(4);
            Some(match caps.get(2)?.as_str() {
                "---->" => PlannedAction::Send(path),
                "<----" => PlannedAction::Receive(path),
                _ => PlannedAction::Conflict(path, status(1), status(3)),
            })
        })
        .collect()
}

fn pending(status: &str, path: &Path) -> PendingChange {
    if status == "deleted" {
        PendingChange::Delete(conflict::deletion_time(path))
    } else {
        PendingChange::Edit(conflict::modification_time(path))
    }
}

/// Remote root as a local directory, when it is one.
fn local_root(address: &str) -> Option<PathBuf> {
    if let Some(path) = address.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    (!address.contains("://")).then(|| PathBuf::from(address))
}

fn normalize_root(address: &str) -> Result<String> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return Err(Error::InvalidAddress(address.to_string()));
    }
    Ok(address.strip_prefix("file://").unwrap_or(address).to_string())
}

/// Base command syncing `local` with `remote`, archives kept in `state_dir`.
fn unison_command(unison: &Path, local: &Path, remote: &str, state_dir: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(unison)
        .arg(local)
        .arg(remote)
        .args(["-batch", "-ui", "text", "-times", "-perms", "0"])
        .args(["-ignore", &format!("Path {}", STATE_DIR_NAME)])
        .env("UNISON", state_dir.join(ARCHIVE_DIR))
        .env("LC_ALL", "C");
    for rule in IGNORE_RULES {
        cmd = cmd.arg("-ignore").arg(format!("Name {}", rule));
    }
    cmd
}

/// Exit code 1 means some paths were skipped, which is not a failure here.
fn succeeded(output: &ToolOutput) -> bool {
    output.success || output.code == Some(1)
}

fn run_reporting(cmd: &ToolCommand, label: &str, ctx: &SyncContext) -> SyncResult<ToolOutput> {
    let mut last = 0.0;
    cmd.run(ctx, |_, line| {
        if let Some(pct) = parse_percentage(line) {
            if pct > last {
                last = pct;
                ctx.report(pct, parse_speed(line).as_deref(), label);
            }
        }
    })
}

/// Unison adapter for an existing replica.
#[derive(Debug)]
pub struct Unison {
    path: PathBuf,
    remote: String,
    user: User,
    unison: PathBuf,
    state: MirrorState,
}

impl Unison {
    pub fn new(options: BackendOptions, unison: PathBuf) -> Result<Self> {
        let remote = normalize_root(&options.remote_url)?;
        Ok(Unison {
            state: MirrorState::new(&options.path, JOURNAL_FILE),
            path: options.path,
            remote,
            user: options.user,
            unison,
        })
    }

    fn command(&self) -> ToolCommand {
        unison_command(&self.unison, &self.path, &self.remote, self.state.dir())
    }

    fn plan(&self, ctx: &SyncContext) -> SyncResult<Vec<PlannedAction>> {
        let local = self.path.display().to_string();
        let output = self
            .command()
            .args(["-noupdate", &local, "-noupdate", &self.remote])
            .run_quiet(ctx)?;
        if !succeeded(&output) {
            return Err(SyncFailure::from_output("unison dry run", &output));
        }
        Ok(parse_plan(output.lines()))
    }

    fn remote_author(&self) -> User {
        let host = self
            .remote
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .map(|h| h.rsplit_once('@').map_or(h, |(_, h)| h))
            .unwrap_or("remote");
        User::new(host, "")
    }

    fn conflicts(&self, plan: &[PlannedAction]) -> Vec<Conflict> {
        let remote_root = local_root(&self.remote);
        plan.iter()
            .filter_map(|action| match action {
                PlannedAction::Conflict(path, local, remote) => {
                    let local = pending(local, &self.path.join(path));
                    let remote = match &remote_root {
                        Some(root) => pending(remote, &root.join(path)),
                        // Unknown remote times tie, which keeps the edit.
                        None if remote == "deleted" => PendingChange::Delete(None),
                        None => PendingChange::Edit(None),
                    };
                    Some(Conflict::new(path.clone(), local, remote))
                }
                _ => None,
            })
            .collect()
    }

    /// Runs one full bidirectional sync.
    fn sync(&self, ctx: &SyncContext) -> SyncResult {
        self.state.write_rules()?;
        let plan = self.plan(ctx)?;
        let conflicts = self.conflicts(&plan);
        if !conflicts.is_empty() {
            let report = conflict::resolve_all(&conflicts, self, &self.user.name, ctx)?;
            debug!("resolved {} conflicts", report.resolved());
        }

        let before = self.state.scan()?;
        let output = run_reporting(&self.command().arg("-auto"), "Synchronizing", ctx)?;
        if !succeeded(&output) {
            return Err(SyncFailure::from_output("unison", &output));
        }
        let after = self.state.scan()?;
        self.state.record_upload(&self.user, &before)?;
        self.state
            .record_download(&self.remote_author(), &before, &after)?;
        Ok(())
    }

    fn force(&self, path: &str, root: &str, ctx: &SyncContext) -> SyncResult {
        let output = self
            .command()
            .args(["-path", path, "-force", root])
            .run_quiet(ctx)?;
        if succeeded(&output) {
            Ok(())
        } else {
            Err(SyncFailure::from_output("unison", &output))
        }
    }
}

impl ConflictReplicas for Unison {
    fn rename_local(&self, from: &str, to: &str) -> SyncResult {
        fs::rename(self.path.join(from), self.path.join(to))?;
        Ok(())
    }

    fn push(&self, path: &str, ctx: &SyncContext) -> SyncResult {
        self.force(path, &self.path.display().to_string(), ctx)
    }

    fn pull(&self, path: &str, ctx: &SyncContext) -> SyncResult {
        self.force(path, &self.remote, ctx)
    }

    fn exists_local(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }
}

impl Backend for Unison {
    fn name(&self) -> &'static str {
        "unison"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn sync_up(&self, ctx: &SyncContext) -> SyncResult {
        self.sync(ctx)
    }

    fn sync_down(&self, ctx: &SyncContext) -> SyncResult {
        self.sync(ctx)
    }

    fn has_local_changes(&self) -> bool {
        self.state.has_local_changes()
    }

    fn has_remote_changes(&self, ctx: &SyncContext) -> bool {
        match self.plan(ctx) {
            Ok(plan) => plan
                .iter()
                .any(|a| !matches!(a, PlannedAction::Send(_))),
            Err(e) => {
                debug!("unison dry run failed: {}", e);
                false
            }
        }
    }

    fn has_unsynced_changes(&self) -> bool {
        self.state.has_unsynced()
    }

    fn set_unsynced_changes(&self, value: bool) -> std::io::Result<()> {
        self.state.set_unsynced(value)
    }

    fn current_revision(&self) -> Option<String> {
        self.state.revision()
    }

    fn size(&self) -> u64 {
        tree_size(&self.path, self.state.excludes())
    }

    fn history_size(&self) -> u64 {
        tree_size(self.state.dir(), &[])
    }

    fn exclude_paths(&self) -> Vec<String> {
        self.state.excludes().to_vec()
    }

    fn change_sets(&self, path: Option<&str>, limit: usize) -> SyncResult<Vec<ChangeSet>> {
        Ok(self.state.journal().read(path, limit))
    }

    /// Serves the current revision only, from a local remote root or from
    /// an unmodified working copy file.
    fn restore_file(
        &self,
        path: &str,
        revision: &str,
        target: &Path,
        _ctx: &SyncContext,
    ) -> SyncResult {
        let not_found = || {
            SyncFailure::new(
                ErrorStatus::NotFound,
                format!("{} at {} is not available from a unison replica", path, revision),
            )
        };
        if self.current_revision().as_deref() != Some(revision) {
            return Err(not_found());
        }
        let source = match local_root(&self.remote) {
            Some(root) => root.join(path),
            None => {
                let current = self.state.scan()?;
                if current.get(path) != self.state.stored().get(path) {
                    return Err(not_found());
                }
                self.path.join(path)
            }
        };
        if !source.is_file() {
            return Err(not_found());
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, target)?;
        Ok(())
    }
}

/// Fetch side of the unison adapter.
#[derive(Debug, Clone)]
pub struct UnisonFetch {
    unison: PathBuf,
}

impl UnisonFetch {
    pub fn new(unison: PathBuf) -> Self {
        UnisonFetch { unison }
    }
}

impl Fetch for UnisonFetch {
    fn fetch(&self, address: &str, target: &Path, ctx: &SyncContext) -> SyncResult {
        let remote = normalize_root(address)
            .map_err(|e| SyncFailure::new(ErrorStatus::NotFound, e.to_string()))?;
        fs::create_dir_all(target)?;
        let state = MirrorState::new(target, JOURNAL_FILE);
        let cmd = unison_command(&self.unison, target, &remote, state.dir())
            .args(["-auto", "-force", &remote]);
        let output = run_reporting(&cmd, "Fetching folder", ctx)?;
        if succeeded(&output) {
            info!("fetched {} with unison", remote);
            Ok(())
        } else {
            Err(SyncFailure::from_output("unison fetch", &output))
        }
    }

    fn bootstrap(&self, folder: &Path, setup: &Bootstrap<'_>) -> SyncResult {
        if setup.storage != StorageType::Plain {
            return Err(SyncFailure::unknown(format!(
                "{} storage is not supported by the unison backend",
                setup.storage.as_str()
            )));
        }
        let state = MirrorState::new(folder, JOURNAL_FILE);
        state.write_rules()?;
        let fetched = state.scan()?;
        state.save(&fetched)?;
        Ok(())
    }

    fn metadata_dir(&self) -> &'static str {
        STATE_DIR_NAME
    }
}

#[cfg(test)]
#[path = "unison_tests.rs"]
mod tests;
