// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict resolution for bidirectional adapters.
//!
//! A conflict is a path with pending operations on both replicas. Edits on
//! both sides keep both versions: the local copy is renamed to
//! `<stem> (<user>, <timestamp>)<ext>` and sent, the remote version takes the
//! original path. For an edit against a deletion the newer side wins and a
//! timestamp tie keeps the edit.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::info;

use crate::backend::{SyncContext, SyncResult};

/// Timestamp format used inside conflict copy names.
const COPY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H.%M.%S";

/// Pending operation on one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingChange {
    /// Content changed; `None` when the time is unknown.
    Edit(Option<DateTime<Local>>),
    /// Path removed; the time is the parent folder's modification time.
    Delete(Option<DateTime<Local>>),
}

/// Operations on the same path on both replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: String,
    pub local: PendingChange,
    pub remote: PendingChange,
}

/// Outcome of [`Conflict::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Rename the local copy, send it, pull the remote version.
    KeepBoth,
    KeepLocalEdit,
    KeepRemoteEdit,
    ApplyLocalDelete,
    ApplyRemoteDelete,
    /// Both sides deleted the path.
    Nothing,
}

impl Conflict {
    pub fn new(path: impl Into<String>, local: PendingChange, remote: PendingChange) -> Self {
        Conflict {
            path: path.into(),
            local,
            remote,
        }
    }

    pub fn decide(&self) -> Resolution {
        use PendingChange::{Delete, Edit};
        match (self.local, self.remote) {
            (Edit(_), Edit(_)) => Resolution::KeepBoth,
            (Delete(_), Delete(_)) => Resolution::Nothing,
            (Delete(deleted), Edit(edited)) => {
                if strictly_newer(deleted, edited) {
                    Resolution::ApplyLocalDelete
                } else {
                    Resolution::KeepRemoteEdit
                }
            }
            (Edit(edited), Delete(deleted)) => {
                if strictly_newer(deleted, edited) {
                    Resolution::ApplyRemoteDelete
                } else {
                    Resolution::KeepLocalEdit
                }
            }
        }
    }
}

/// Unknown times count as a tie.
fn strictly_newer(a: Option<DateTime<Local>>, b: Option<DateTime<Local>>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a > b)
}

/// Replica operations the resolver needs from an adapter.
pub trait ConflictReplicas {
    /// Renames a path in the local replica.
    fn rename_local(&self, from: &str, to: &str) -> SyncResult;

    /// Makes the remote replica match the local one for `path`.
    fn push(&self, path: &str, ctx: &SyncContext) -> SyncResult;

    /// Makes the local replica match the remote one for `path`.
    fn pull(&self, path: &str, ctx: &SyncContext) -> SyncResult;

    /// Whether a path exists in the local replica.
    fn exists_local(&self, path: &str) -> bool;
}

/// What [`resolve_all`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Paths whose edit beat a deletion.
    pub recovered: Vec<String>,
    /// `(original, local copy)` pairs for edit-versus-edit conflicts.
    pub kept_both: Vec<(String, String)>,
}

impl ResolutionReport {
    pub fn resolved(&self) -> usize {
        self.recovered.len() + self.kept_both.len()
    }
}

/// Resolves every conflict, reporting each one to the context's reporter.
pub fn resolve_all(
    conflicts: &[Conflict],
    replicas: &dyn ConflictReplicas,
    user: &str,
    ctx: &SyncContext,
) -> SyncResult<ResolutionReport> {
    let mut report = ResolutionReport::default();

    for conflict in conflicts {
        let path = conflict.path.as_str();
        match conflict.decide() {
            Resolution::KeepBoth => {
                let copy = conflict_copy_name(path, user, Local::now(), |p| replicas.exists_local(p));
                replicas.rename_local(path, &copy)?;
                replicas.push(&copy, ctx)?;
                replicas.pull(path, ctx)?;
                info!("Conflict on {}, kept local copy as {}", path, copy);
                report.kept_both.push((path.to_string(), copy));
                ctx.reporter.conflict_resolved();
            }
            Resolution::KeepLocalEdit => {
                replicas.push(path, ctx)?;
                info!("Recovered {}", path);
                report.recovered.push(path.to_string());
                ctx.reporter.conflict_resolved();
            }
            Resolution::KeepRemoteEdit => {
                replicas.pull(path, ctx)?;
                info!("Recovered {}", path);
                report.recovered.push(path.to_string());
                ctx.reporter.conflict_resolved();
            }
            Resolution::ApplyLocalDelete => replicas.push(path, ctx)?,
            Resolution::ApplyRemoteDelete => replicas.pull(path, ctx)?,
            Resolution::Nothing => {}
        }
    }

    Ok(report)
}

/// Name for the local copy of a conflicting path.
///
/// `docs/plan.txt` becomes `docs/plan (Alice, 2026-03-05 14.02.09).txt`.
/// When that name is taken a counter is appended to the stem.
pub fn conflict_copy_name(
    path: &str,
    user: &str,
    when: DateTime<Local>,
    exists: impl Fn(&str) -> bool,
) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let (stem, ext) = split_extension(file);
    let label = format!("{} ({}, {})", stem, user, when.format(COPY_TIMESTAMP_FORMAT));

    let join = |name: String| match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    };

    let mut candidate = join(format!("{}{}", label, ext));
    let mut counter = 2;
    while exists(&candidate) {
        candidate = join(format!("{} {}{}", label, counter, ext));
        counter += 1;
    }
    candidate
}

/// Splits `name.ext` into `("name", ".ext")`; dotfiles have no extension.
fn split_extension(file: &str) -> (&str, &str) {
    match file.rfind('.') {
        Some(0) | None => (file, ""),
        Some(i) => (&file[..i], &file[i..]),
    }
}

/// Modification time of a file, as a pending edit's timestamp.
pub fn modification_time(path: &Path) -> Option<DateTime<Local>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(to_local)
}

/// Timestamp of a deletion: the modification time of the parent folder.
pub fn deletion_time(path: &Path) -> Option<DateTime<Local>> {
    modification_time(path.parent()?)
}

fn to_local(time: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(time)
}

#[cfg(test)]
#[path = "conflict_tests.rs"]
mod tests;
