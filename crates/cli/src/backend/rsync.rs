// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! rsync mirror adapter.
//!
//! The remote is a plain directory. Uploads mirror the folder onto it,
//! downloads bring newer remote files in without deleting local work that
//! has not been sent yet. History is the local transfer journal.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use drift_core::{ChangeSet, ErrorStatus, StorageType, User};
use regex::Regex;
use tracing::debug;

use super::mirror::MirrorState;
use super::process::{Stream, ToolCommand, ToolOutput};
use super::progress::{parse_percentage, parse_speed};
use super::{
    tree_size, Backend, BackendOptions, Bootstrap, Fetch, SyncContext, SyncFailure, SyncResult,
    STATE_DIR_NAME,
};
use crate::error::{Error, Result};

const JOURNAL_FILE: &str = "rsync.log";

static TO_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"(?:to-chk|ir-chk)=(\d+)/(\d+)") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    }
});

/// Where rsync should read from or write to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Argument passed to rsync, without a trailing slash.
    pub target: String,
    /// Host name for remote targets.
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl RemoteTarget {
    /// Translates a folder address into an rsync target.
    ///
    /// `ssh://[user@]host[:port]/path` becomes `[user@]host:/path`;
    /// `rsync://` URLs and local paths pass through.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(Error::InvalidAddress(url.to_string()));
        }
        if let Some(rest) = url.strip_prefix("ssh://") {
            let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
            let (login, port) = match authority.rsplit_once(':') {
                Some((login, port)) => match port.parse::<u16>() {
                    Ok(port) => (login, Some(port)),
                    Err(_) => return Err(Error::InvalidAddress(url.to_string())),
                },
                None => (authority, None),
            };
            if login.is_empty() {
                return Err(Error::InvalidAddress(url.to_string()));
            }
            let host = login.rsplit_once('@').map_or(login, |(_, h)| h);
            return Ok(RemoteTarget {
                target: format!("{}:/{}", login, path),
                host: Some(host.to_string()),
                port,
            });
        }
        if let Some(rest) = url.strip_prefix("rsync://") {
            let host = rest.split('/').next().unwrap_or_default();
            return Ok(RemoteTarget {
                target: url.to_string(),
                host: Some(host.to_string()),
                port: None,
            });
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(RemoteTarget {
            target: path.to_string(),
            host: None,
            port: None,
        })
    }

    /// Name recorded as the author of downloaded changes.
    pub fn author(&self) -> User {
        User::new(self.host.as_deref().unwrap_or("remote"), "")
    }

    fn dir(&self) -> String {
        format!("{}/", self.target)
    }

    fn ssh_command(&self) -> String {
        match self.port {
            Some(port) => format!("ssh -o BatchMode=yes -p {}", port),
            None => "ssh -o BatchMode=yes".to_string(),
        }
    }
}

/// Overall percentage from rsync's `to-chk=<left>/<total>` counter.
pub fn overall_progress(line: &str) -> Option<f64> {
    let caps = TO_CHECK.captures(line)?;
    let left: f64 = caps.get(1)?.as_str().parse().ok()?;
    let total: f64 = caps.get(2)?.as_str().parse().ok()?;
    if total <= 0.0 {
        return None;
    }
    Some(((total - left) / total * 100.0).clamp(0.0, 100.0))
}

/// Whether an itemized dry-run line means the receiver would change.
fn itemized_change(line: &str, known: impl Fn(&str) -> bool) -> bool {
    if let Some(path) = line.strip_prefix("*deleting") {
        return known(path.trim().trim_end_matches('/'));
    }
    line.starts_with('>') || line.starts_with("cd") || line.starts_with("cL")
}

fn rsync_command(rsync: &Path, remote: &RemoteTarget) -> ToolCommand {
    ToolCommand::new(rsync)
        .arg("-e")
        .arg(remote.ssh_command())
        .env("LC_ALL", "C")
}

/// Runs a transfer, reporting monotonic progress from the file counter or
/// per-file percentages.
fn transfer(cmd: &ToolCommand, label: &str, ctx: &SyncContext) -> SyncResult<ToolOutput> {
    let mut last = 0.0;
    cmd.run(ctx, |stream, line| {
        if stream != Stream::Stdout {
            return;
        }
        let Some(pct) = overall_progress(line).or_else(|| parse_percentage(line)) else {
            return;
        };
        if pct > last {
            last = pct;
            ctx.report(pct, parse_speed(line).as_deref(), label);
        }
    })
}

/// rsync adapter for an existing mirror.
#[derive(Debug)]
pub struct Rsync {
    path: PathBuf,
    remote: RemoteTarget,
    user: User,
    rsync: PathBuf,
    state: MirrorState,
}

impl Rsync {
    pub fn new(options: BackendOptions, rsync: PathBuf) -> Result<Self> {
        let remote = RemoteTarget::parse(&options.remote_url)?;
        Ok(Rsync {
            state: MirrorState::new(&options.path, JOURNAL_FILE),
            path: options.path,
            remote,
            user: options.user,
            rsync,
        })
    }

    fn command(&self, rules: &Path) -> ToolCommand {
        rsync_command(&self.rsync, &self.remote)
            .arg("-aizP")
            .arg(format!("--exclude-from={}", rules.display()))
            .arg(format!("--exclude=/{}/", STATE_DIR_NAME))
            .current_dir(&self.path)
    }

    fn down_command(&self, rules: &Path, delete: bool, dry_run: bool) -> ToolCommand {
        let mut cmd = self.command(rules).arg("-u");
        if delete {
            cmd = cmd.arg("--delete");
        }
        if dry_run {
            cmd = cmd.arg("-n");
        }
        cmd.arg(self.remote.dir()).arg("./")
    }
}

impl Backend for Rsync {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn sync_up(&self, ctx: &SyncContext) -> SyncResult {
        let rules = self.state.write_rules()?;
        let current = self.state.scan()?;
        let cmd = self
            .command(&rules)
            .arg("--delete")
            .arg("./")
            .arg(self.remote.dir());
        let output = transfer(&cmd, "Sending changes", ctx)?;
        if !output.success {
            return Err(SyncFailure::from_output("rsync upload", &output));
        }
        self.state.record_upload(&self.user, &current)?;
        Ok(())
    }

    fn sync_down(&self, ctx: &SyncContext) -> SyncResult {
        let rules = self.state.write_rules()?;
        let before = self.state.scan()?;
        // Deleting locally is only safe when everything local was sent.
        let delete = self.state.stored().diff(&before, chrono::Local::now()).is_empty();
        let output = transfer(&self.down_command(&rules, delete, false), "Receiving changes", ctx)?;
        if !output.success {
            return Err(SyncFailure::from_output("rsync download", &output));
        }
        let after = self.state.scan()?;
        self.state
            .record_download(&self.remote.author(), &before, &after)?;
        Ok(())
    }

    fn has_local_changes(&self) -> bool {
        self.state.has_local_changes()
    }

    fn has_remote_changes(&self, ctx: &SyncContext) -> bool {
        let Ok(rules) = self.state.write_rules() else {
            return false;
        };
        let cmd = self.down_command(&rules, true, true);
        let output = match cmd.run_quiet(ctx) {
            Ok(o) if o.success => o,
            Ok(o) => {
                debug!("rsync dry run failed: {}", o.summary());
                return false;
            }
            Err(e) => {
                debug!("rsync dry run failed: {}", e);
                return false;
            }
        };
        let stored = self.state.stored();
        output
            .stdout
            .iter()
            .any(|line| itemized_change(line, |p| stored.get(p).is_some()))
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

    /// Only the current revision exists: a mirror keeps no older versions.
    fn restore_file(
        &self,
        path: &str,
        revision: &str,
        target: &Path,
        ctx: &SyncContext,
    ) -> SyncResult {
        if self.current_revision().as_deref() != Some(revision) {
            return Err(SyncFailure::new(
                ErrorStatus::NotFound,
                format!("revision {} is not available from an rsync mirror", revision),
            ));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let output = rsync_command(&self.rsync, &self.remote)
            .arg("-a")
            .arg(format!("{}{}", self.remote.dir(), path))
            .arg(target)
            .run_quiet(ctx)?;
        if output.success {
            Ok(())
        } else {
            let mut failure = SyncFailure::from_output("rsync restore", &output);
            if output.lines().any(|l| l.contains("No such file or directory")) {
                failure.status = ErrorStatus::NotFound;
            }
            Err(failure)
        }
    }
}

/// Fetch side of the rsync adapter.
#[derive(Debug, Clone)]
pub struct RsyncFetch {
    rsync: PathBuf,
}

impl RsyncFetch {
    pub fn new(rsync: PathBuf) -> Self {
        RsyncFetch { rsync }
    }
}

impl Fetch for RsyncFetch {
    fn fetch(&self, address: &str, target: &Path, ctx: &SyncContext) -> SyncResult {
        let remote = RemoteTarget::parse(address)
            .map_err(|e| SyncFailure::new(ErrorStatus::NotFound, e.to_string()))?;
        fs::create_dir_all(target)?;
        let cmd = rsync_command(&self.rsync, &remote)
            .arg("-aizP")
            .arg(format!("--exclude=/{}/", STATE_DIR_NAME))
            .arg(remote.dir())
            .arg(format!("{}/", target.display()));
        let output = transfer(&cmd, "Fetching folder", ctx)?;
        if output.success {
            Ok(())
        } else {
            Err(SyncFailure::from_output("rsync fetch", &output))
        }
    }

    fn bootstrap(&self, folder: &Path, setup: &Bootstrap<'_>) -> SyncResult {
        if setup.storage != StorageType::Plain {
            return Err(SyncFailure::unknown(format!(
                "{} storage is not supported by the rsync backend",
                setup.storage.as_str()
            )));
        }
        let state = MirrorState::new(folder, JOURNAL_FILE);
        state.write_rules()?;
        // What arrived is the synced baseline.
        let fetched = state.scan()?;
        state.save(&fetched)?;
        Ok(())
    }

    fn metadata_dir(&self) -> &'static str {
        STATE_DIR_NAME
    }
}

#[cfg(test)]
#[path = "rsync_tests.rs"]
mod tests;
