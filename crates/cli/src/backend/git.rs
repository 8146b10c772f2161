// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Git adapter.
//!
//! The working copy is a regular clone with `origin` pointing at the remote.
//! Local edits are committed with a generated message and pushed; remote
//! edits are fetched and merged, with merge conflicts resolved by keeping
//! both versions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use drift_core::{ChangeSet, StorageType, User};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::errors;
use super::history;
use super::ignore;
use super::process::{Stream, ToolCommand, ToolOutput};
use super::progress::{parse_speed, Phase, PhasedProgress};
use super::{
    cached_size, fill_empty_folders, tree_size, write_flag, Backend, BackendOptions, Bootstrap, Fetch, StorageOffer,
    SyncContext, SyncFailure, SyncResult, UNSYNCED_FLAG_NAME,
};
use crate::conflict::conflict_copy_name;

const GIT_DIR: &str = ".git";
const DEFAULT_BRANCH: &str = "master";

/// Branch whose presence on the remote marks large-file storage.
const LFS_BRANCH: &str = "x-drift-lfs";
/// Prefix of the branch marking encrypted storage; the salt follows it.
const ENCRYPTED_BRANCH_PREFIX: &str = "x-drift-encrypted-";

/// Entries listed in a commit message before it is abbreviated.
const MAX_MESSAGE_ENTRIES: usize = 10;

const PUSH_PHASES: &[Phase] = &[
    Phase {
        prefix: "Compressing objects",
        start: 0.0,
        end: 20.0,
    },
    Phase {
        prefix: "Writing objects",
        start: 20.0,
        end: 100.0,
    },
];

const FETCH_PHASES: &[Phase] = &[
    Phase {
        prefix: "Receiving objects",
        start: 0.0,
        end: 90.0,
    },
    Phase {
        prefix: "Resolving deltas",
        start: 90.0,
        end: 100.0,
    },
];

/// Base command with the options every invocation needs.
fn git_command(git: &Path, user: &User) -> ToolCommand {
    let email = if user.email.is_empty() {
        "unknown@drift"
    } else {
        user.email.as_str()
    };
    ToolCommand::new(git)
        .args(["-c", "core.quotepath=false", "-c", "core.autocrlf=false"])
        .arg("-c")
        .arg(format!("user.name={}", user.name))
        .arg("-c")
        .arg(format!("user.email={}", email))
        .env("LC_ALL", "C")
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes")
}

/// Runs a transfer, reporting phase progress parsed from stderr.
fn run_transfer(
    cmd: &ToolCommand,
    phases: &'static [Phase],
    label: &str,
    ctx: &SyncContext,
) -> SyncResult<ToolOutput> {
    let mut progress = PhasedProgress::new(phases);
    cmd.run(ctx, |stream, line| {
        if stream != Stream::Stderr {
            return;
        }
        if let Some(pct) = progress.update(line) {
            ctx.report(pct, parse_speed(line).as_deref(), label);
        }
    })
}

/// Removes the quoting git applies to unusual paths.
fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits a porcelain status line into its two-letter code and path(s).
fn parse_status_line(line: &str) -> Option<(&str, &str)> {
    if line.len() < 4 || !line.is_char_boundary(2) || !line.is_char_boundary(3) {
        return None;
    }
    Some((&line[..2], &line[3..]))
}

/// Composes a commit message from `git status --porcelain` output taken
/// after staging.
///
/// ```text
/// + ‘added.txt’
/// / ‘edited.txt’
/// - ‘deleted.txt’
/// < ‘old.txt’
/// > ‘new.txt’
/// ```
///
/// With `first_line` the message starts with it followed by a blank line.
pub fn format_commit_message<'a>(
    status: impl IntoIterator<Item = &'a str>,
    first_line: Option<&str>,
) -> String {
    let mut entries = Vec::new();
    for line in status {
        let Some((code, paths)) = parse_status_line(line) else {
            continue;
        };
        let entry = match code.chars().next() {
            Some('A') => format!("+ ‘{}’", unquote(paths)),
            Some('M') | Some('T') => format!("/ ‘{}’", unquote(paths)),
            Some('D') => format!("- ‘{}’", unquote(paths)),
            Some('R') | Some('C') => match paths.split_once(" -> ") {
                Some((from, to)) if code.starts_with('R') => {
                    format!("< ‘{}’\n> ‘{}’", unquote(from), unquote(to))
                }
                Some((_, to)) => format!("+ ‘{}’", unquote(to)),
                None => format!("+ ‘{}’", unquote(paths)),
            },
            _ => continue,
        };
        entries.push(entry);
    }

    let total = entries.len();
    let mut body = entries
        .into_iter()
        .take(MAX_MESSAGE_ENTRIES)
        .collect::<Vec<_>>()
        .join("\n");
    if total > MAX_MESSAGE_ENTRIES {
        body.push_str(&format!("\n...and {} more", total - MAX_MESSAGE_ENTRIES));
    }

    match first_line.map(str::trim).filter(|l| !l.is_empty()) {
        Some(first) if body.is_empty() => first.to_string(),
        Some(first) => format!("{}\n\n{}", first, body),
        None if body.is_empty() => "Changes".to_string(),
        None => body,
    }
}

/// Writes the shared ignore rules into the repository's exclude file.
fn write_exclude_file(git_dir: &Path) -> std::io::Result<()> {
    let info = git_dir.join("info");
    fs::create_dir_all(&info)?;
    fs::write(info.join("exclude"), ignore::rules_file())
}

/// Git adapter for an existing clone.
#[derive(Debug)]
pub struct Git {
    path: PathBuf,
    remote_url: String,
    user: User,
    git: PathBuf,
    storage: StorageType,
    cancel: CancellationToken,
}

impl Git {
    pub fn new(options: BackendOptions, git: PathBuf) -> Self {
        Git {
            path: options.path,
            remote_url: options.remote_url,
            user: options.user,
            git,
            storage: options.storage,
            cancel: options.cancel,
        }
    }

    fn git_dir(&self) -> PathBuf {
        self.path.join(GIT_DIR)
    }

    fn command(&self) -> ToolCommand {
        git_command(&self.git, &self.user).current_dir(&self.path)
    }

    /// Context for short queries that report nothing.
    fn quick(&self) -> SyncContext {
        SyncContext::new(self.cancel.clone())
    }

    /// Runs a query; a failure is classified from its output.
    fn query(&self, args: &[&str], ctx: &SyncContext) -> SyncResult<ToolOutput> {
        let output = self.command().args(args).run_quiet(ctx)?;
        if output.success {
            Ok(output)
        } else {
            Err(SyncFailure::from_output(&format!("git {}", args[0]), &output))
        }
    }

    fn branch(&self) -> String {
        self.command()
            .args(["symbolic-ref", "--short", "HEAD"])
            .run_quiet(&self.quick())
            .ok()
            .filter(|o| o.success)
            .and_then(|o| o.first_line().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
    }

    fn prepare(&self) -> SyncResult {
        write_exclude_file(&self.git_dir())?;
        fill_empty_folders(&self.path, GIT_DIR)?;
        Ok(())
    }

    fn stage(&self, ctx: &SyncContext) -> SyncResult {
        let output = self.command().args(["add", "--all"]).run_quiet(ctx)?;
        if output.success {
            return Ok(());
        }
        let status = errors::classify_staging(output.lines());
        Err(SyncFailure::new(
            status,
            format!("git add failed: {}", output.summary()),
        ))
    }

    /// Commits whatever is staged. Returns whether a commit was made.
    fn commit_staged(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let diff = self
            .command()
            .args(["diff", "--cached", "--quiet"])
            .run_quiet(ctx)?;
        if diff.success {
            return Ok(false);
        }
        let status = self.query(&["status", "--porcelain"], ctx)?;
        let message = format_commit_message(
            status.stdout.iter().map(String::as_str),
            ctx.message.as_deref(),
        );
        self.query(&["commit", "--quiet", "-m", &message], ctx)?;
        debug!("[{}] committed local changes", self.path.display());
        Ok(true)
    }

    fn push(&self, ctx: &SyncContext) -> SyncResult {
        let branch = self.branch();
        let cmd = self.command().args(["push", "--progress", "origin", &branch]);
        let output = run_transfer(&cmd, PUSH_PHASES, "Sending changes", ctx)?;
        if output.success {
            Ok(())
        } else {
            Err(SyncFailure::from_output("git push", &output))
        }
    }

    /// Fetches the remote branch. Returns false when the remote has none yet.
    fn fetch(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let branch = self.branch();
        let cmd = self
            .command()
            .args(["fetch", "--progress", "origin", &branch]);
        let output = run_transfer(&cmd, FETCH_PHASES, "Receiving changes", ctx)?;
        if output.success {
            return Ok(true);
        }
        if output.lines().any(|l| l.contains("couldn't find remote ref")) {
            return Ok(false);
        }
        Err(SyncFailure::from_output("git fetch", &output))
    }

    fn merge(&self, ctx: &SyncContext) -> SyncResult {
        let output = self
            .command()
            .args(["merge", "--no-edit", "FETCH_HEAD"])
            .run_quiet(ctx)?;
        if output.success {
            return Ok(());
        }
        let unmerged = self.unmerged_paths(ctx)?;
        if unmerged.is_empty() {
            return Err(SyncFailure::from_output("git merge", &output));
        }
        self.resolve_conflicts(&unmerged, ctx)
    }

    fn commits_ahead_of_fetched(&self, ctx: &SyncContext) -> SyncResult<usize> {
        let output = self.query(&["rev-list", "--count", "FETCH_HEAD..HEAD"], ctx)?;
        Ok(output
            .first_line()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(0))
    }

    fn unmerged_paths(&self, ctx: &SyncContext) -> SyncResult<Vec<(String, String)>> {
        let status = self.query(&["status", "--porcelain"], ctx)?;
        Ok(status
            .stdout
            .iter()
            .filter_map(|l| parse_status_line(l))
            .filter(|(code, _)| matches!(*code, "UU" | "AA" | "AU" | "UA" | "DU" | "UD" | "DD"))
            .map(|(code, path)| (code.to_string(), unquote(path)))
            .collect())
    }

    fn resolve_conflicts(&self, unmerged: &[(String, String)], ctx: &SyncContext) -> SyncResult {
        for (code, path) in unmerged {
            match code.as_str() {
                "UU" | "AA" | "AU" | "UA" => {
                    let copy = conflict_copy_name(path, &self.user.name, Local::now(), |p| {
                        self.path.join(p).exists()
                    });
                    let ours = self
                        .command()
                        .arg("show")
                        .arg(format!(":2:{}", path))
                        .run_to_file(&self.path.join(&copy), ctx)?;
                    if !ours.success {
                        let _ = fs::remove_file(self.path.join(&copy));
                    }
                    self.query(&["checkout", "--theirs", "--", path], ctx)?;
                    self.query(&["add", "--", path], ctx)?;
                    if ours.success {
                        self.query(&["add", "--", &copy], ctx)?;
                        info!("Conflict on {}, kept local copy as {}", path, copy);
                    }
                }
                // Modified on one side and deleted on the other: the
                // modified version is already in the working tree.
                "DU" | "UD" => {
                    self.query(&["add", "--", path], ctx)?;
                    info!("Recovered {}", path);
                }
                _ => {
                    self.query(&["rm", "--quiet", "--cached", "--", path], ctx)?;
                }
            }
            ctx.reporter.conflict_resolved();
        }
        self.query(&["commit", "--quiet", "--no-edit"], ctx)?;
        Ok(())
    }

    /// Name of the remote branch advertising this folder's storage type.
    fn storage_marker(&self) -> Option<String> {
        match self.storage {
            StorageType::Plain => None,
            StorageType::LargeFiles => Some(LFS_BRANCH.to_string()),
            StorageType::Encrypted => self
                .query(&["config", "drift.salt"], &self.quick())
                .ok()
                .and_then(|o| o.first_line().map(|salt| format!("{}{}", ENCRYPTED_BRANCH_PREFIX, salt))),
        }
    }

    /// Pushes the storage marker branch once, so later fetchers can detect
    /// the storage type.
    fn push_storage_marker(&self, ctx: &SyncContext) -> SyncResult {
        let Some(branch) = self.storage_marker() else {
            return Ok(());
        };
        let flag = self.git_dir().join("info/storage_marker");
        if flag.exists() {
            return Ok(());
        }
        let refspec = format!("HEAD:refs/heads/{}", branch);
        self.query(&["push", "--quiet", "origin", &refspec], ctx)?;
        fs::write(flag, branch)?;
        Ok(())
    }

    fn update_size_caches(&self) {
        let info = self.git_dir().join("info");
        let size = tree_size(&self.path, &[GIT_DIR.to_string()]);
        let history = tree_size(&self.git_dir(), &[]);
        let result = fs::create_dir_all(&info)
            .and_then(|_| fs::write(info.join("size"), size.to_string()))
            .and_then(|_| fs::write(info.join("history_size"), history.to_string()));
        if let Err(e) = result {
            warn!("could not write size cache: {}", e);
        }
    }
}

impl Backend for Git {
    fn name(&self) -> &'static str {
        "git"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn sync_up(&self, ctx: &SyncContext) -> SyncResult {
        self.prepare()?;
        self.stage(ctx)?;
        self.commit_staged(ctx)?;
        self.push(ctx)?;
        self.push_storage_marker(ctx)?;
        self.update_size_caches();
        Ok(())
    }

    fn sync_down(&self, ctx: &SyncContext) -> SyncResult {
        if !self.fetch(ctx)? {
            debug!("remote {} has no history yet", self.remote_url);
            return Ok(());
        }
        self.prepare()?;
        self.stage(ctx)?;
        self.commit_staged(ctx)?;
        self.merge(ctx)?;
        // Local commits made or merged here still have to be pushed.
        if self.commits_ahead_of_fetched(ctx)? > 0 {
            self.set_unsynced_changes(true)?;
        }
        self.update_size_caches();
        Ok(())
    }

    fn has_local_changes(&self) -> bool {
        self.command()
            .args(["status", "--porcelain", "--untracked-files=all"])
            .run_quiet(&self.quick())
            .map(|o| o.success && o.stdout.iter().any(|l| !l.trim().is_empty()))
            .unwrap_or(false)
    }

    fn has_remote_changes(&self, ctx: &SyncContext) -> bool {
        let branch = self.branch();
        let output = match self
            .command()
            .args(["ls-remote", "--heads", "--exit-code", "origin", &branch])
            .run_quiet(ctx)
        {
            Ok(o) => o,
            Err(e) => {
                debug!("ls-remote failed: {}", e);
                return false;
            }
        };
        if !output.success {
            // Exit code 2: the remote has no such branch yet.
            if output.code != Some(2) {
                debug!("ls-remote failed: {}", output.summary());
            }
            return false;
        }
        let remote = output
            .first_line()
            .and_then(|l| l.split_whitespace().next())
            .map(str::to_string);
        remote.is_some() && remote != self.current_revision()
    }

    fn has_unsynced_changes(&self) -> bool {
        self.git_dir().join(UNSYNCED_FLAG_NAME).exists()
    }

    fn set_unsynced_changes(&self, value: bool) -> std::io::Result<()> {
        write_flag(&self.git_dir().join(UNSYNCED_FLAG_NAME), value)
    }

    fn current_revision(&self) -> Option<String> {
        self.command()
            .args(["rev-parse", "--verify", "--quiet", "HEAD"])
            .run_quiet(&self.quick())
            .ok()
            .filter(|o| o.success)
            .and_then(|o| o.first_line().map(str::to_string))
    }

    fn size(&self) -> u64 {
        cached_size(&self.git_dir().join("info/size"), || {
            tree_size(&self.path, &[GIT_DIR.to_string()])
        })
    }

    fn history_size(&self) -> u64 {
        cached_size(&self.git_dir().join("info/history_size"), || {
            tree_size(&self.git_dir(), &[])
        })
    }

    fn exclude_paths(&self) -> Vec<String> {
        vec![GIT_DIR.to_string()]
    }

    fn change_sets(&self, path: Option<&str>, limit: usize) -> SyncResult<Vec<ChangeSet>> {
        if self.current_revision().is_none() {
            return Ok(Vec::new());
        }
        let limit = limit.to_string();
        let format = format!(
            "--format=format:{}%x09%H%x09%an%x09%ae%x09%ad",
            history::COMMIT_MARKER
        );
        let mut args = vec![
            "log",
            format.as_str(),
            "--date=iso",
            "--name-status",
            "--find-renames",
            "--no-merges",
            "-n",
            limit.as_str(),
        ];
        if let Some(path) = path {
            args.extend(["--", path]);
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
            .arg("show")
            .arg(format!("{}:{}", revision, path))
            .run_to_file(target, ctx);
        match output {
            Ok(o) if o.success => Ok(()),
            Ok(o) => {
                let _ = fs::remove_file(target);
                let mut failure = SyncFailure::from_output("git show", &o);
                if o.lines().any(|l| l.contains("does not exist") || l.contains("bad revision")) {
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

/// Fetch side of the git adapter.
#[derive(Debug, Clone)]
pub struct GitFetch {
    git: PathBuf,
}

impl GitFetch {
    pub fn new(git: PathBuf) -> Self {
        GitFetch { git }
    }

    fn command(&self, user: &User) -> ToolCommand {
        git_command(&self.git, user)
    }

    fn configure(&self, folder: &Path, user: &User, key: &str, value: &str) -> SyncResult {
        let output = self
            .command(user)
            .current_dir(folder)
            .args(["config", key, value])
            .run_quiet(&SyncContext::new(CancellationToken::new()))?;
        if output.success {
            Ok(())
        } else {
            Err(SyncFailure::from_output("git config", &output))
        }
    }
}

/// Salt for a new encrypted folder: 16 hex digits derived from the folder
/// path and the current time.
fn generate_salt(folder: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(folder.to_string_lossy().as_bytes());
    hasher.update(Local::now().to_rfc3339().as_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

impl Fetch for GitFetch {
    fn fetch(&self, address: &str, target: &Path, ctx: &SyncContext) -> SyncResult {
        let user = User::new("drift", "");
        let cmd = self
            .command(&user)
            .args(["clone", "--progress", "--origin", "origin", address])
            .arg(target);
        let output = run_transfer(&cmd, FETCH_PHASES, "Fetching folder", ctx)?;
        if output.success {
            Ok(())
        } else {
            Err(SyncFailure::from_output("git clone", &output))
        }
    }

    fn storage_offers(&self, address: &str, ctx: &SyncContext) -> Vec<StorageOffer> {
        let user = User::new("drift", "");
        let output = match self
            .command(&user)
            .args(["ls-remote", "--heads", address])
            .run_quiet(ctx)
        {
            Ok(o) if o.success => o,
            _ => return vec![StorageOffer::plain()],
        };
        let mut offers = Vec::new();
        for line in &output.stdout {
            let Some(branch) = line
                .split_whitespace()
                .nth(1)
                .and_then(|r| r.strip_prefix("refs/heads/"))
            else {
                continue;
            };
            if branch == LFS_BRANCH {
                offers.push(StorageOffer {
                    storage_type: StorageType::LargeFiles,
                    salt: None,
                });
            } else if let Some(salt) = branch.strip_prefix(ENCRYPTED_BRANCH_PREFIX) {
                offers.push(StorageOffer {
                    storage_type: StorageType::Encrypted,
                    salt: Some(salt.to_string()),
                });
            }
        }
        if offers.is_empty() {
            offers.push(StorageOffer::plain());
        }
        offers
    }

    fn bootstrap(&self, folder: &Path, setup: &Bootstrap<'_>) -> SyncResult {
        let user = setup.user;
        for (key, value) in [
            ("core.ignorecase", "false"),
            ("core.autocrlf", "false"),
            ("core.quotepath", "false"),
            ("user.name", user.name.as_str()),
            ("user.email", user.email.as_str()),
        ] {
            self.configure(folder, user, key, value)?;
        }
        let git_dir = folder.join(GIT_DIR);
        write_exclude_file(&git_dir)?;

        match setup.storage {
            StorageType::Plain => {}
            StorageType::LargeFiles => {
                let output = self
                    .command(user)
                    .current_dir(folder)
                    .args(["lfs", "install", "--local"])
                    .run_quiet(&SyncContext::new(CancellationToken::new()))?;
                if !output.success {
                    return Err(SyncFailure::from_output("git lfs install", &output));
                }
                fs::write(
                    git_dir.join("info/attributes"),
                    "* filter=lfs diff=lfs merge=lfs -text\n",
                )?;
            }
            StorageType::Encrypted => {
                let Some(password) = setup.password else {
                    return Err(SyncFailure::unknown(
                        "encrypted storage requires a password",
                    ));
                };
                let salt = setup
                    .salt
                    .map(str::to_string)
                    .unwrap_or_else(|| generate_salt(folder));
                self.configure(folder, user, "drift.salt", &salt)?;
                let password_file = git_dir.join("info/encryption_password");
                fs::write(&password_file, password)?;
                let base = format!(
                    "openssl enc -aes-256-cbc -pbkdf2 -S {} -pass file:{}",
                    salt,
                    password_file.display()
                );
                self.configure(folder, user, "filter.encryption.clean", &format!("{} -e -base64", base))?;
                self.configure(folder, user, "filter.encryption.smudge", &format!("{} -d -base64", base))?;
                fs::write(
                    git_dir.join("info/attributes"),
                    "* filter=encryption -diff merge=binary\n",
                )?;
            }
        }
        info!("bootstrapped {} for {}", folder.display(), setup.address);
        Ok(())
    }

    fn metadata_dir(&self) -> &'static str {
        GIT_DIR
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
