// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter driving user-configured shell commands.
//!
//! Each operation is a command line run through `sh -c` in the folder, with
//! the operation's inputs in `DRIFT_*` environment variables. Exit status
//! decides success; output lines are classified and scanned for `NN%`
//! progress like any other tool. Tools such as Subversion plug in here.

use std::fs;
use std::path::{Path, PathBuf};

use drift_core::{ChangeSet, ErrorStatus, User};
use tracing::debug;

use super::mirror::MirrorState;
use super::process::{ToolCommand, ToolOutput};
use super::progress::{parse_percentage, parse_speed};
use super::{
    tree_size, Backend, BackendOptions, Bootstrap, ExternalCommands, Fetch, SyncContext,
    SyncFailure, SyncResult, STATE_DIR_NAME,
};
use crate::error::{Error, Result};

const JOURNAL_FILE: &str = "external.log";
const SHELL: &str = "sh";

/// Values exposed to commands as `DRIFT_*` variables.
#[derive(Debug, Default)]
struct CommandEnv<'a> {
    folder: Option<&'a Path>,
    url: &'a str,
    user: Option<&'a User>,
    message: Option<&'a str>,
    target: Option<&'a Path>,
    path: Option<&'a str>,
    revision: Option<&'a str>,
}

fn shell_command(line: &str, cwd: Option<&Path>, env: &CommandEnv<'_>) -> ToolCommand {
    let mut cmd = ToolCommand::new(SHELL)
        .args(["-c", line])
        .env("DRIFT_URL", env.url)
        .env("LC_ALL", "C");
    if let Some(dir) = cwd {
        cmd = cmd.current_dir(dir);
    }
    if let Some(folder) = env.folder {
        cmd = cmd.env("DRIFT_FOLDER", folder);
    }
    if let Some(user) = env.user {
        cmd = cmd
            .env("DRIFT_USER_NAME", &user.name)
            .env("DRIFT_USER_EMAIL", &user.email);
    }
    if let Some(message) = env.message {
        cmd = cmd.env("DRIFT_MESSAGE", message);
    }
    if let Some(target) = env.target {
        cmd = cmd.env("DRIFT_TARGET", target);
    }
    if let Some(path) = env.path {
        cmd = cmd.env("DRIFT_PATH", path);
    }
    if let Some(revision) = env.revision {
        cmd = cmd.env("DRIFT_REVISION", revision);
    }
    cmd
}

/// Mirror state for `folder`, also excluding metadata of a wrapped
/// version-control tool.
fn mirror_state(folder: &Path) -> MirrorState {
    let mut state = MirrorState::new(folder, JOURNAL_FILE);
    for dir in [".svn", ".git", ".hg"] {
        if folder.join(dir).is_dir() {
            state = state.exclude(dir);
        }
    }
    state
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

fn check(what: &str, output: ToolOutput) -> SyncResult<ToolOutput> {
    if output.success {
        Ok(output)
    } else {
        Err(SyncFailure::from_output(what, &output))
    }
}

/// External-command adapter.
#[derive(Debug)]
pub struct External {
    path: PathBuf,
    remote_url: String,
    user: User,
    sync_up: String,
    sync_down: String,
    commands: ExternalCommands,
    state: MirrorState,
}

impl External {
    /// Fails when `sync_up` or `sync_down` is not configured.
    pub fn new(options: BackendOptions) -> Result<Self> {
        let commands = options.commands.unwrap_or_default();
        let sync_up = commands.sync_up.clone().ok_or(Error::MissingCommand {
            backend: "external",
            command: "sync_up",
        })?;
        let sync_down = commands.sync_down.clone().ok_or(Error::MissingCommand {
            backend: "external",
            command: "sync_down",
        })?;
        Ok(External {
            state: mirror_state(&options.path),
            path: options.path,
            remote_url: options.remote_url,
            user: options.user,
            sync_up,
            sync_down,
            commands,
        })
    }

    fn env<'a>(&'a self, ctx: &'a SyncContext) -> CommandEnv<'a> {
        CommandEnv {
            folder: Some(&self.path),
            url: &self.remote_url,
            user: Some(&self.user),
            message: ctx.message.as_deref(),
            ..Default::default()
        }
    }

    fn command(&self, line: &str, env: &CommandEnv<'_>) -> ToolCommand {
        shell_command(line, Some(&self.path), env)
    }

    fn remote_author(&self) -> User {
        let host = self
            .remote_url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .filter(|h| !h.is_empty())
            .unwrap_or("remote");
        User::new(host, "")
    }
}

impl Backend for External {
    fn name(&self) -> &'static str {
        "external"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn sync_up(&self, ctx: &SyncContext) -> SyncResult {
        let sent = self.state.scan()?;
        let cmd = self.command(&self.sync_up, &self.env(ctx));
        check("sync_up command", run_reporting(&cmd, "Sending changes", ctx)?)?;
        self.state.record_upload(&self.user, &sent)?;
        Ok(())
    }

    fn sync_down(&self, ctx: &SyncContext) -> SyncResult {
        let before = self.state.scan()?;
        let cmd = self.command(&self.sync_down, &self.env(ctx));
        check("sync_down command", run_reporting(&cmd, "Receiving changes", ctx)?)?;
        let after = self.state.scan()?;
        self.state
            .record_download(&self.remote_author(), &before, &after)?;
        Ok(())
    }

    fn has_local_changes(&self) -> bool {
        self.state.has_local_changes()
    }

    /// Without a configured check every poll syncs down.
    fn has_remote_changes(&self, ctx: &SyncContext) -> bool {
        let Some(line) = &self.commands.has_remote_changes else {
            return true;
        };
        match self.command(line, &self.env(ctx)).run_quiet(ctx) {
            Ok(output) => output.success,
            Err(e) => {
                debug!("has_remote_changes command failed: {}", e);
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
        let Some(line) = &self.commands.revision else {
            return self.state.revision();
        };
        let ctx = SyncContext::new(Default::default());
        self.command(line, &self.env(&ctx))
            .run_quiet(&ctx)
            .ok()
            .filter(|o| o.success)
            .and_then(|o| o.first_line().map(str::to_string))
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

    fn restore_file(
        &self,
        path: &str,
        revision: &str,
        target: &Path,
        ctx: &SyncContext,
    ) -> SyncResult {
        let Some(line) = &self.commands.restore else {
            return Err(SyncFailure::new(
                ErrorStatus::NotFound,
                "no restore command configured",
            ));
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let env = CommandEnv {
            target: Some(target),
            path: Some(path),
            revision: Some(revision),
            ..self.env(ctx)
        };
        let result = self
            .command(line, &env)
            .run_quiet(ctx)
            .and_then(|o| check("restore command", o));
        if result.is_err() {
            let _ = fs::remove_file(target);
        }
        result.map(|_| ())
    }
}

/// Fetch side of the external adapter.
#[derive(Debug, Clone)]
pub struct ExternalFetch {
    fetch: String,
}

impl ExternalFetch {
    /// Fails when no `fetch` command is configured.
    pub fn new(commands: ExternalCommands) -> Result<Self> {
        let fetch = commands.fetch.ok_or(Error::MissingCommand {
            backend: "external",
            command: "fetch",
        })?;
        Ok(ExternalFetch { fetch })
    }
}

impl Fetch for ExternalFetch {
    fn fetch(&self, address: &str, target: &Path, ctx: &SyncContext) -> SyncResult {
        let env = CommandEnv {
            url: address,
            target: Some(target),
            ..Default::default()
        };
        let cmd = shell_command(&self.fetch, target.parent(), &env);
        check("fetch command", run_reporting(&cmd, "Fetching folder", ctx)?)?;
        Ok(())
    }

    fn bootstrap(&self, folder: &Path, _setup: &Bootstrap<'_>) -> SyncResult {
        let state = mirror_state(folder);
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
#[path = "external_tests.rs"]
mod tests;
