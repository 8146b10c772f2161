// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution for adapters.
//!
//! Output is drained line by line while the tool runs, so progress can be
//! parsed as it happens and a full pipe never stalls the child. Carriage
//! returns count as line breaks because transfer tools redraw their progress
//! line with `\r`.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{SyncContext, SyncFailure, SyncResult};

/// How often the drain loop wakes up to check for cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ToolOutput {
    /// All captured lines, stderr first.
    pub fn lines(&self) -> impl Iterator<Item = &str> + Clone {
        self.stderr
            .iter()
            .chain(self.stdout.iter())
            .map(String::as_str)
    }

    /// First stdout line, trimmed.
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }

    /// Short human-readable description for error messages.
    pub fn summary(&self) -> String {
        let last = self
            .stderr
            .iter()
            .rev()
            .chain(self.stdout.iter().rev())
            .map(|l| l.trim())
            .find(|l| !l.is_empty());
        match (last, self.code) {
            (Some(line), _) => line.to_string(),
            (None, Some(code)) => format!("exit code {}", code),
            (None, None) => "terminated by signal".to_string(),
        }
    }

    fn push(&mut self, stream: Stream, line: String) {
        match stream {
            Stream::Stdout => self.stdout.push(line),
            Stream::Stderr => self.stderr.push(line),
        }
    }
}

/// Builder for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// The command line, for logs and error messages.
    pub fn display(&self) -> String {
        let mut s = self.program.display().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }

    /// Runs the tool, handing every output line to `on_line` as it arrives.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ToolOutput::success`]. Spawn failures and cancellation are.
    pub fn run(&self, ctx: &SyncContext, on_line: impl FnMut(Stream, &str)) -> SyncResult<ToolOutput> {
        self.execute(Stdio::piped(), ctx, on_line)
    }

    /// Runs the tool without a line callback.
    pub fn run_quiet(&self, ctx: &SyncContext) -> SyncResult<ToolOutput> {
        self.execute(Stdio::piped(), ctx, |_, _| {})
    }

    /// Runs the tool with stdout streamed into `target`.
    pub fn run_to_file(&self, target: &Path, ctx: &SyncContext) -> SyncResult<ToolOutput> {
        let file = File::create(target)?;
        self.execute(Stdio::from(file), ctx, |_, _| {})
    }

    fn command(&self, stdout: Stdio) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    fn execute(
        &self,
        stdout: Stdio,
        ctx: &SyncContext,
        mut on_line: impl FnMut(Stream, &str),
    ) -> SyncResult<ToolOutput> {
        if ctx.is_cancelled() {
            return Err(SyncFailure::cancelled());
        }

        debug!("running {}", self.display());
        let mut child = self
            .command(stdout)
            .spawn()
            .map_err(|e| SyncFailure::unknown(format!("failed to run {}: {}", self.display(), e)))?;

        // Readers are detached: a grandchild holding the pipe open must not
        // keep a cancelled call waiting.
        let (tx, rx) = mpsc::channel::<(Stream, String)>();
        if let Some(out) = child.stdout.take() {
            let tx = tx.clone();
            thread::spawn(move || drain(out, Stream::Stdout, &tx));
        }
        if let Some(err) = child.stderr.take() {
            let tx = tx.clone();
            thread::spawn(move || drain(err, Stream::Stderr, &tx));
        }
        drop(tx);

        let mut output = ToolOutput::default();
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok((stream, line)) => {
                    on_line(stream, &line);
                    output.push(stream, line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if ctx.is_cancelled() {
                kill(&mut child);
                return Err(SyncFailure::cancelled());
            }
        }

        let status = child.wait()?;
        output.success = status.success();
        output.code = status.code();
        Ok(output)
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Splits a byte stream on `\n` and `\r` and forwards non-empty lines.
fn drain(mut reader: impl Read, stream: Stream, tx: &mpsc::Sender<(Stream, String)>) {
    let mut pending = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                if !send_line(&mut pending, stream, tx) {
                    return;
                }
            } else {
                pending.push(byte);
            }
        }
    }
    send_line(&mut pending, stream, tx);
}

fn send_line(pending: &mut Vec<u8>, stream: Stream, tx: &mpsc::Sender<(Stream, String)>) -> bool {
    if pending.is_empty() {
        return true;
    }
    let line = String::from_utf8_lossy(pending).into_owned();
    pending.clear();
    tx.send((stream, line)).is_ok()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
