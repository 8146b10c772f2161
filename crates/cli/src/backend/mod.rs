// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Backend adapters.
//!
//! Every synchronization technology sits behind the [`Backend`] trait and is
//! selected by name through [`BackendKind`]. Adapters drive their tool as a
//! subprocess (see [`process`]), translate its history into
//! [`ChangeSet`]s and classify its failures into an [`ErrorStatus`]
//! (see [`errors`]). They never panic and never leak raw tool output as an
//! error type: a failed operation is a [`SyncFailure`].

pub mod errors;
mod external;
mod git;
mod hg;
pub mod history;
pub mod ignore;
mod journal;
mod manifest;
mod mirror;
pub mod process;
pub mod progress;
mod rsync;
mod unison;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use drift_core::{ChangeSet, ErrorStatus, StorageType, User};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub use external::{External, ExternalFetch};
pub use git::{format_commit_message, Git, GitFetch};
pub use hg::{Hg, HgFetch};
pub use rsync::{Rsync, RsyncFetch};
pub use unison::{Unison, UnisonFetch};

/// Directory inside a folder where non-VCS adapters keep their state.
pub const STATE_DIR_NAME: &str = ".drift";

/// Name of the flag file recording that a sync up is owed.
pub const UNSYNCED_FLAG_NAME: &str = "has_unsynced_changes";

/// A failed adapter operation with its classified reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SyncFailure {
    pub status: ErrorStatus,
    pub message: String,
}

impl SyncFailure {
    pub fn new(status: ErrorStatus, message: impl Into<String>) -> Self {
        SyncFailure {
            status,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorStatus::Unknown, message)
    }

    pub fn cancelled() -> Self {
        Self::unknown("operation cancelled")
    }

    /// Builds a failure from tool output, classifying it with the shared table.
    pub fn from_output(what: &str, output: &process::ToolOutput) -> Self {
        let status = errors::classify(output.lines());
        Self::new(status, format!("{} failed: {}", what, output.summary()))
    }
}

impl From<std::io::Error> for SyncFailure {
    fn from(e: std::io::Error) -> Self {
        let status = match e.raw_os_error() {
            // ENOSPC, EDQUOT
            Some(28) | Some(122) => ErrorStatus::DiskSpaceExceeded,
            _ => ErrorStatus::Unknown,
        };
        SyncFailure::new(status, e.to_string())
    }
}

/// Result of an adapter operation.
pub type SyncResult<T = ()> = std::result::Result<T, SyncFailure>;

/// Receives progress from adapters while an operation runs.
pub trait SyncReporter: Send + Sync {
    /// Reports a parsed progress value in `0.0..=100.0`.
    fn progress(&self, percentage: f64, speed: Option<&str>, message: &str);

    /// Called once for every conflict resolved during a sync.
    fn conflict_resolved(&self) {}
}

/// Reporter that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl SyncReporter for NullReporter {
    fn progress(&self, _percentage: f64, _speed: Option<&str>, _message: &str) {}
}

/// Per-call collaborators handed to every long-running adapter operation.
#[derive(Clone)]
pub struct SyncContext {
    pub cancel: CancellationToken,
    pub reporter: Arc<dyn SyncReporter>,
    /// First line of the commit message, for adapters that commit.
    pub message: Option<String>,
}

impl SyncContext {
    pub fn new(cancel: CancellationToken) -> Self {
        SyncContext {
            cancel,
            reporter: Arc::new(NullReporter),
            message: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn SyncReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn report(&self, percentage: f64, speed: Option<&str>, message: &str) {
        self.reporter.progress(percentage, speed, message);
    }
}

impl fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("message", &self.message)
            .finish()
    }
}

/// Capability contract shared by every synchronization technology.
///
/// Queries that are expected to be quick (`has_local_changes`,
/// `current_revision`, ...) use the cancellation token the adapter was built
/// with. Transfers take an explicit [`SyncContext`].
pub trait Backend: Send + Sync {
    /// Backend name as used in configuration.
    fn name(&self) -> &'static str;

    /// Root of the working copy.
    fn path(&self) -> &Path;

    /// Sends local changes to the remote.
    fn sync_up(&self, ctx: &SyncContext) -> SyncResult;

    /// Brings remote changes into the working copy.
    fn sync_down(&self, ctx: &SyncContext) -> SyncResult;

    fn has_local_changes(&self) -> bool;

    fn has_remote_changes(&self, ctx: &SyncContext) -> bool;

    /// Whether a sync up was started and not confirmed. Survives restarts.
    fn has_unsynced_changes(&self) -> bool;

    fn set_unsynced_changes(&self, value: bool) -> std::io::Result<()>;

    fn current_revision(&self) -> Option<String>;

    /// Bytes in the working copy, excluding adapter metadata.
    fn size(&self) -> u64;

    /// Bytes of history kept locally.
    fn history_size(&self) -> u64;

    /// Top-level paths the watcher and the staging step must ignore.
    fn exclude_paths(&self) -> Vec<String>;

    /// History, newest first, optionally restricted to one path.
    fn change_sets(&self, path: Option<&str>, limit: usize) -> SyncResult<Vec<ChangeSet>>;

    /// Writes `path` as of `revision` to `target` without touching the
    /// working copy's revision.
    fn restore_file(&self, path: &str, revision: &str, target: &Path, ctx: &SyncContext)
        -> SyncResult;
}

/// A storage mode offered by a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOffer {
    pub storage_type: StorageType,
    pub salt: Option<String>,
}

impl StorageOffer {
    pub fn plain() -> Self {
        StorageOffer {
            storage_type: StorageType::Plain,
            salt: None,
        }
    }
}

/// Inputs for installing bootstrap files into a freshly fetched folder.
#[derive(Debug, Clone)]
pub struct Bootstrap<'a> {
    pub user: &'a User,
    pub address: &'a str,
    pub storage: StorageType,
    pub salt: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// One-shot creation of a working copy from a remote address.
pub trait Fetch: Send + Sync {
    /// Clones `address` into `target`, which does not exist yet.
    fn fetch(&self, address: &str, target: &Path, ctx: &SyncContext) -> SyncResult;

    /// Storage modes the remote already uses.
    fn storage_offers(&self, _address: &str, _ctx: &SyncContext) -> Vec<StorageOffer> {
        vec![StorageOffer::plain()]
    }

    /// Installs ignore rules, identity and storage configuration.
    fn bootstrap(&self, folder: &Path, setup: &Bootstrap<'_>) -> SyncResult;

    /// Metadata directory that does not count as content.
    fn metadata_dir(&self) -> &'static str;
}

/// Commands run by the external adapter, configured per folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_up: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_down: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_remote_changes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<String>,
}

/// Supported synchronization technologies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    #[default]
    Git,
    Hg,
    Rsync,
    Unison,
    External,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Git => "git",
            BackendKind::Hg => "hg",
            BackendKind::Rsync => "rsync",
            BackendKind::Unison => "unison",
            BackendKind::External => "external",
        }
    }

    /// Default tool executable for the backend.
    fn default_tool(&self) -> PathBuf {
        match self {
            BackendKind::Git => crate::env::git_binary().unwrap_or_else(|| PathBuf::from("git")),
            BackendKind::Hg => PathBuf::from("hg"),
            BackendKind::Rsync => PathBuf::from("rsync"),
            BackendKind::Unison => PathBuf::from("unison"),
            BackendKind::External => PathBuf::from("sh"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(BackendKind::Git),
            "hg" | "mercurial" => Ok(BackendKind::Hg),
            "rsync" => Ok(BackendKind::Rsync),
            "unison" => Ok(BackendKind::Unison),
            "external" => Ok(BackendKind::External),
            _ => Err(Error::UnknownBackend(s.to_string())),
        }
    }
}

/// Collaborators an adapter is constructed with.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub path: PathBuf,
    pub remote_url: String,
    pub user: User,
    pub storage: StorageType,
    /// Tool executable; the backend default when `None`.
    pub tool: Option<PathBuf>,
    pub commands: Option<ExternalCommands>,
    pub cancel: CancellationToken,
}

impl BackendOptions {
    pub fn new(path: impl Into<PathBuf>, remote_url: impl Into<String>, user: User) -> Self {
        BackendOptions {
            path: path.into(),
            remote_url: remote_url.into(),
            user,
            storage: StorageType::Plain,
            tool: None,
            commands: None,
            cancel: CancellationToken::new(),
        }
    }

    fn tool_for(&self, kind: BackendKind) -> PathBuf {
        self.tool.clone().unwrap_or_else(|| kind.default_tool())
    }
}

/// Opens an adapter for an existing working copy.
pub fn open(kind: BackendKind, options: BackendOptions) -> Result<Box<dyn Backend>> {
    let tool = options.tool_for(kind);
    Ok(match kind {
        BackendKind::Git => Box::new(Git::new(options, tool)),
        BackendKind::Hg => Box::new(Hg::new(options, tool)),
        BackendKind::Rsync => Box::new(Rsync::new(options, tool)?),
        BackendKind::Unison => Box::new(Unison::new(options, tool)?),
        BackendKind::External => Box::new(External::new(options)?),
    })
}

/// Returns the fetch side of an adapter.
pub fn fetcher(
    kind: BackendKind,
    tool: Option<PathBuf>,
    commands: Option<ExternalCommands>,
) -> Result<Box<dyn Fetch>> {
    let tool = tool.unwrap_or_else(|| kind.default_tool());
    Ok(match kind {
        BackendKind::Git => Box::new(GitFetch::new(tool)),
        BackendKind::Hg => Box::new(HgFetch::new(tool)),
        BackendKind::Rsync => Box::new(RsyncFetch::new(tool)),
        BackendKind::Unison => Box::new(UnisonFetch::new(tool)),
        BackendKind::External => Box::new(ExternalFetch::new(commands.unwrap_or_default())?),
    })
}

/// Total bytes of regular files under `root`, skipping excluded top-level
/// entries. Unreadable entries count as zero.
pub fn tree_size(root: &Path, excludes: &[String]) -> u64 {
    fn walk(dir: &Path, top: bool, excludes: &[String]) -> u64 {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        let mut total = 0;
        for entry in entries.flatten() {
            if top {
                let name = entry.file_name();
                if excludes.iter().any(|e| name.to_string_lossy() == e.as_str()) {
                    continue;
                }
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() {
                total += walk(&entry.path(), false, excludes);
            } else {
                total += meta.len();
            }
        }
        total
    }
    walk(root, true, excludes)
}

/// Puts a placeholder file into every empty folder below `root` so tools
/// that track files only keep the folder. The metadata directory is skipped.
fn fill_empty_folders(root: &Path, metadata_dir: &str) -> std::io::Result<()> {
    fn walk(dir: &Path, top: bool, metadata_dir: &str) -> std::io::Result<()> {
        let mut has_entries = false;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if top && entry.file_name() == metadata_dir {
                continue;
            }
            has_entries = true;
            if entry.file_type()?.is_dir() {
                walk(&entry.path(), false, metadata_dir)?;
            }
        }
        if !has_entries && !top {
            fs::write(dir.join(history::EMPTY_FOLDER_PLACEHOLDER), b"")?;
        }
        Ok(())
    }
    walk(root, true, metadata_dir)
}

/// Reads a cached byte count, falling back to `compute`.
fn cached_size(cache: &Path, compute: impl FnOnce() -> u64) -> u64 {
    fs::read_to_string(cache)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(compute)
}

/// Creates or removes a flag file.
fn write_flag(path: &Path, value: bool) -> std::io::Result<()> {
    if value {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"")
    } else {
        match fs::remove_file(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
