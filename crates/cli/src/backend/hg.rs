// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mercurial adapter.
//!
//! Mirrors the git adapter: commit, push, pull and merge, with merge
//! conflicts resolved by keeping the local version under a conflict name.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use drift_core::{ChangeSet, StorageType, User};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::errors;
use super::format_commit_message;
use super::history;
use super::ignore;
use super::process::{Stream, ToolCommand, ToolOutput};
use super::progress::{parse_speed, PhasedProgress};
use super::{
    fill_empty_folders, tree_size, write_flag, Backend, BackendOptions, Bootstrap, Fetch,
    SyncContext, SyncFailure, SyncResult, UNSYNCED_FLAG_NAME,
};
use crate::conflict::conflict_copy_name;

const HG_DIR: &str = ".hg";
const IGNORE_FILE: &str = "drift-ignore";

/// Revision hg reports for an empty repository.
const NULL_REVISION: &str = "0000000000000000000000000000000000000000";

/// Log template producing the shared history line format.
const LOG_TEMPLATE: &str = "commit\\t{node}\\t{author|person}\\t{author|email}\\t{date|isodatesec}\\n\
{file_adds % 'A\\t{file}\\n'}{file_mods % 'M\\t{file}\\n'}{file_dels % 'D\\t{file}\\n'}";

fn hg_command(hg: &Path, user: &User) -> ToolCommand {
    ToolCommand::new(hg)
        .args(["--config", "ui.interactive=false", "--config"])
        .arg(format!("ui.username={} <{}>", user.name, user.email))
        .args(["--config", "progress.assume-tty=true", "--config", "progress.delay=0"])
        .env("HGPLAIN", "1")
        .env("LC_ALL", "C")
}

fn ignore_rules() -> String {
    format!("syntax: glob\n{}", ignore::rules_file())
}

/// Translates `hg status` lines into porcelain-style lines for the commit
/// message composer.
fn status_to_porcelain(line: &str) -> Option<String> {
    let (code, path) = line.split_once(' ')?;
    let code = match code {
        "A" => "A ",
        "M" => "M ",
        "R" | "!" => "D ",
        _ => return None,
    };
    Some(format!("{} {}", code, path))
}

/// Mercurial adapter for an existing clone.
#[derive(Debug)]
pub struct Hg {
    path: PathBuf,
    remote_url: String,
    user: User,
    hg: PathBuf,
    cancel: CancellationToken,
}

impl Hg {
    pub fn new(options: BackendOptions, hg: PathBuf) -> Self {
        Hg {
            path: options.path,
            remote_url: options.remote_url,
            user: options.user,
            hg,
            cancel: options.cancel,
        }
    }

    fn hg_dir(&self) -> PathBuf {
        self.path.join(HG_DIR)
    }

    fn command(&self) -> ToolCommand {
        let ignore = self.hg_dir().join(IGNORE_FILE);
        hg_command(&self.hg, &self.user)
            .arg("--config")
            .arg(format!("ui.ignore={}", ignore.display()))
            .current_dir(&self.path)
    }

    fn quick(&self) -> SyncContext {
        SyncContext::new(self.cancel.clone())
    }

    fn query(&self, args: &[&str], ctx: &SyncContext) -> SyncResult<ToolOutput> {
        let output = self.command().args(args).run_quiet(ctx)?;
        if output.success {
            Ok(output)
        } else {
            Err(SyncFailure::from_output(&format!("hg {}", args[0]), &output))
        }
    }

    fn transfer(&self, args: &[&str], label: &str, ctx: &SyncContext) -> SyncResult<ToolOutput> {
        let mut progress = PhasedProgress::new(&[]);
        self.command().args(args).run(ctx, |stream, line| {
            if stream == Stream::Stderr {
                if let Some(pct) = progress.update(line) {
                    ctx.report(pct, parse_speed(line).as_deref(), label);
                }
            }
        })
    }

    fn prepare(&self) -> SyncResult {
        fs::create_dir_all(self.hg_dir())?;
        fs::write(self.hg_dir().join(IGNORE_FILE), ignore_rules())?;
        fill_empty_folders(&self.path, HG_DIR)?;
        Ok(())
    }

    fn status(&self, ctx: &SyncContext) -> SyncResult<Vec<String>> {
        Ok(self.query(&["status"], ctx)?.stdout)
    }

    /// Records added, removed and edited files and commits them.
    fn commit_all(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let output = self.command().arg("addremove").run_quiet(ctx)?;
        if !output.success {
            return Err(SyncFailure::new(
                errors::classify_staging(output.lines()),
                format!("hg addremove failed: {}", output.summary()),
            ));
        }
        let status = self.status(ctx)?;
        let porcelain: Vec<String> = status.iter().filter_map(|l| status_to_porcelain(l)).collect();
        if porcelain.is_empty() {
            return Ok(false);
        }
        let message = format_commit_message(
            porcelain.iter().map(String::as_str),
            ctx.message.as_deref(),
        );
        self.query(&["commit", "-m", &message], ctx)?;
        Ok(true)
    }

    fn heads(&self, ctx: &SyncContext) -> SyncResult<usize> {
        let output = self.query(&["heads", "--template", "{node}\\n"], ctx)?;
        Ok(output.stdout.iter().filter(|l| !l.trim().is_empty()).count())
    }

    fn merge(&self, ctx: &SyncContext) -> SyncResult {
        let output = self
            .command()
            .args(["merge", "--tool", "internal:fail"])
            .run_quiet(ctx)?;
        if !output.success {
            let unresolved = self.query(&["resolve", "--list"], ctx)?;
            let paths: Vec<String> = unresolved
                .stdout
                .iter()
                .filter_map(|l| l.strip_prefix("U "))
                .map(str::to_string)
                .collect();
            if paths.is_empty() {
                return Err(SyncFailure::from_output("hg merge", &output));
            }
            for path in paths {
                // internal:fail leaves the local version in the working copy.
                let copy = conflict_copy_name(&path, &self.user.name, Local::now(), |p| {
                    self.path.join(p).exists()
                });
                fs::copy(self.path.join(&path), self.path.join(&copy))?;
                self.query(&["resolve", "--tool", "internal:other", &path], ctx)?;
                self.query(&["add", &copy], ctx)?;
                info!("Conflict on {}, kept local copy as {}", path, copy);
                ctx.reporter.conflict_resolved();
            }
        }
        self.query(&["commit", "-m", "Merge"], ctx)?;
        Ok(())
    }
}

impl Backend for Hg {
    fn name(&self) -> &'static str {
        "hg"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn sync_up(&self, ctx: &SyncContext) -> SyncResult {
        self.prepare()?;
        self.commit_all(ctx)?;
        let output = self.transfer(&["push"], "Sending changes", ctx)?;
        // Exit code 1: nothing to push.
        if output.success || output.code == Some(1) {
            Ok(())
        } else {
            Err(SyncFailure::from_output("hg push", &output))
        }
    }

    fn sync_down(&self, ctx: &SyncContext) -> SyncResult {
        let output = self.transfer(&["pull"], "Receiving changes", ctx)?;
        if !output.success {
            return Err(SyncFailure::from_output("hg pull", &output));
        }
        self.prepare()?;
        let committed = self.commit_all(ctx)?;
        let merged = self.heads(ctx)? > 1;
        if merged {
            self.merge(ctx)?;
        } else {
            self.query(&["update"], ctx)?;
        }
        // Local commits made or merged here still have to be pushed.
        if committed || merged {
            self.set_unsynced_changes(true)?;
        }
        Ok(())
    }

    fn has_local_changes(&self) -> bool {
        self.status(&self.quick())
            .map(|lines| lines.iter().any(|l| !l.trim().is_empty()))
            .unwrap_or(false)
    }

    fn has_remote_changes(&self, ctx: &SyncContext) -> bool {
        // Exit code 0 when incoming changesets exist, 1 when there are none.
        match self.command().args(["incoming", "--quiet"]).run_quiet(ctx) {
            Ok(o) => o.success,
            Err(e) => {
                debug!("hg incoming failed: {}", e);
                false
            }
        }
    }

    fn has_unsynced_changes(&self) -> bool {
        self.hg_dir().join(UNSYNCED_FLAG_NAME).exists()
    }

    fn set_unsynced_changes(&self, value: bool) -> std::io::Result<()> {
        write_flag(&self.hg_dir().join(UNSYNCED_FLAG_NAME), value)
    }

    fn current_revision(&self) -> Option<String> {
        self.query(&["log", "-r", ".", "--template", "{node}"], &self.quick())
            .ok()
            .and_then(|o| o.first_line().map(str::to_string))
            .filter(|rev| rev != NULL_REVISION)
    }

    fn size(&self) -> u64 {
        tree_size(&self.path, &[HG_DIR.to_string()])
    }

    fn history_size(&self) -> u64 {
        tree_size(&self.hg_dir(), &[])
    }

    fn exclude_paths(&self) -> Vec<String> {
        vec![HG_DIR.to_string()]
    }

    fn change_sets(&self, path: Option<&str>, limit: usize) -> SyncResult<Vec<ChangeSet>> {
        if self.current_revision().is_none() {
            return Ok(Vec::new());
        }
        let limit = limit.to_string();
        let mut args = vec!["log", "--no-merges", "--limit", limit.as_str(), "--template", LOG_TEMPLATE];
        if let Some(path) = path {
            args.push(path);
        }
        let output = self.query(&args, &self.quick())?;
        let mut change_sets = history::parse_log(output.stdout.iter().map(String::as_str));
        for cs in &mut change_sets {
            cs.remote_url = Some(self.remote_url.clone());
        }
        Ok(change_sets)
    }

    fn restore_file(
        &self,
        path: &str,
        revision: &str,
        target: &Path,
        ctx: &SyncContext,
    ) -> SyncResult {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let output = self
            .command()
            .args(["cat", "-r", revision, path])
            .run_to_file(target, ctx);
        match output {
            Ok(o) if o.success => Ok(()),
            Ok(o) => {
                let _ = fs::remove_file(target);
                let mut failure = SyncFailure::from_output("hg cat", &o);
                if o.lines().any(|l| l.contains("no such file") || l.contains("unknown revision")) {
                    failure.status = drift_core::ErrorStatus::NotFound;
                }
                Err(failure)
            }
            Err(e) => {
                let _ = fs::remove_file(target);
                Err(e)
            }
        }
    }
}

/// Fetch side of the Mercurial adapter.
#[derive(Debug, Clone)]
pub struct HgFetch {
    hg: PathBuf,
}

impl HgFetch {
    pub fn new(hg: PathBuf) -> Self {
        HgFetch { hg }
    }
}

impl Fetch for HgFetch {
    fn fetch(&self, address: &str, target: &Path, ctx: &SyncContext) -> SyncResult {
        let mut progress = PhasedProgress::new(&[]);
        let output = hg_command(&self.hg, &User::new("drift", ""))
            .args(["clone", address])
            .arg(target)
            .run(ctx, |stream, line| {
                if stream == Stream::Stderr {
                    if let Some(pct) = progress.update(line) {
                        ctx.report(pct, parse_speed(line).as_deref(), "Fetching folder");
                    }
                }
            })?;
        if output.success {
            Ok(())
        } else {
            Err(SyncFailure::from_output("hg clone", &output))
        }
    }

    fn bootstrap(&self, folder: &Path, setup: &Bootstrap<'_>) -> SyncResult {
        let hg_dir = folder.join(HG_DIR);
        fs::create_dir_all(&hg_dir)?;
        fs::write(hg_dir.join(IGNORE_FILE), ignore_rules())?;

        let mut hgrc = format!(
            "[paths]\ndefault = {}\n\n[ui]\nusername = {} <{}>\nignore = {}\n",
            setup.address,
            setup.user.name,
            setup.user.email,
            hg_dir.join(IGNORE_FILE).display()
        );
        match setup.storage {
            StorageType::Plain => {}
            StorageType::LargeFiles => hgrc.push_str("\n[extensions]\nlargefiles =\n"),
            StorageType::Encrypted => {
                return Err(SyncFailure::unknown(
                    "encrypted storage is not supported by the hg backend",
                ));
            }
        }
        fs::write(hg_dir.join("hgrc"), hgrc)?;
        Ok(())
    }

    fn metadata_dir(&self) -> &'static str {
        HG_DIR
    }
}

#[cfg(test)]
#[path = "hg_tests.rs"]
mod tests;
