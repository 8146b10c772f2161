// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::str::FromStr;

use crate::backend::BackendKind;
use crate::colors;
use crate::help;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

fn backend_kind(s: &str) -> Result<BackendKind, String> {
    BackendKind::from_str(s).map_err(|_| {
        format!("unknown backend '{s}' (expected git, hg, rsync, unison or external)")
    })
}

/// Parses `KIND=COMMAND LINE` for the external backend.
fn external_command(s: &str) -> Result<(String, String), String> {
    let (kind, line) = s
        .split_once('=')
        .ok_or_else(|| "expected KIND=COMMAND".to_string())?;
    let kind = kind.trim();
    const KINDS: [&str; 6] = [
        "sync_up",
        "sync_down",
        "has_remote_changes",
        "revision",
        "fetch",
        "restore",
    ];
    if !KINDS.contains(&kind) {
        return Err(format!("unknown command kind '{kind}' (expected one of: {})", KINDS.join(", ")));
    }
    if line.trim().is_empty() {
        return Err(format!("command for '{kind}' is empty"));
    }
    Ok((kind.to_string(), line.to_string()))
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "drift")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(disable_version_flag = true)]
#[command(about = "Keep folders in sync through the version-control and file-transfer tools you already use")]
#[command(
    long_about = "Keep folders in sync through the version-control and file-transfer tools you already use.\n\n\
    Every folder is a working copy of a remote. Local edits are sent as soon as the folder \
    settles, and remote edits are fetched when a peer announces them or the poll timer fires."
)]
#[command(help_template = help::template())]
#[command(before_help = help::commands())]
#[command(after_help = help::quickstart())]
#[command(styles = help::styles())]
#[allow(clippy::manual_non_exhaustive)]
pub struct Cli {
    /// Print version
    #[arg(short = 'v', short_alias = 'V', long = "version", action = clap::ArgAction::Version)]
    version: (),

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch a remote folder and start tracking it
    #[command(
        arg_required_else_help = true,
        after_help = colors::examples("\
Examples:
  drift add ssh://host/srv/photos                 Fetch with git into ~/Drift/photos
  drift add ssh+rsync://host/backup               Pick the backend from the address
  drift add host:notes --backend hg --name notes  Explicit backend and name
  drift add ssh://host/vault --password <secret>  Fetch an encrypted folder
  drift add /srv/share --backend external --command \"fetch=cp -R $DRIFT_URL $DRIFT_TARGET\"

Addresses:
  Forms: ssh://host/path, ssh+BACKEND://host/path, https://..., /local/path
  Default: a bare host/path is treated as ssh://host/path")
    )]
    Add {
        /// Remote address
        #[arg(value_parser = non_empty_string)]
        address: String,

        /// Backend (git, hg, rsync, unison, external)
        #[arg(long, short, value_parser = backend_kind)]
        backend: Option<BackendKind>,

        /// Folder name (defaults to the last path segment of the address)
        #[arg(long, short, value_parser = non_empty_string)]
        name: Option<String>,

        /// Local path (defaults to ~/Drift/<name>)
        #[arg(long, short)]
        path: Option<PathBuf>,

        /// Expected host key fingerprint, recorded with the folder
        #[arg(long)]
        fingerprint: Option<String>,

        /// Announcement relay, e.g. ws://relay.example.org:1986
        #[arg(long, value_name = "URL")]
        announcements: Option<String>,

        /// Password for encrypted storage
        #[arg(long)]
        password: Option<String>,

        /// External backend command (repeatable), e.g. sync_up="svn commit -m \"$DRIFT_MESSAGE\""
        #[arg(long = "command", value_name = "KIND=COMMAND", value_parser = external_command)]
        commands: Vec<(String, String)>,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List configured folders
    #[command(after_help = colors::examples("\
Examples:
  drift list            One line per folder
  drift list -o json    Output as JSON"))]
    List {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show sync status of a folder
    #[command(arg_required_else_help = true)]
    Status {
        /// Folder name
        folder: String,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show recent changes, grouped per author and day
    #[command(
        arg_required_else_help = true,
        after_help = colors::examples("\
Examples:
  drift log photos                  Recent changes in photos
  drift log photos 2026/trip.jpg    Changes to one file
  drift log photos -n 5 -o json     Five most recent entries as JSON")
    )]
    Log {
        /// Folder name
        folder: String,

        /// Only changes touching this path (relative to the folder)
        path: Option<String>,

        /// Maximum number of entries before grouping
        #[arg(long, short = 'n', default_value_t = 30)]
        limit: usize,

        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Suspend syncing for a folder
    #[command(arg_required_else_help = true)]
    Pause {
        /// Folder name
        folder: String,
    },

    /// Resume syncing for a folder and send what changed meanwhile
    #[command(
        arg_required_else_help = true,
        after_help = colors::examples("\
Examples:
  drift resume photos                     Resume syncing
  drift resume photos -m \"Trip photos\"    Use a message for the pending changes")
    )]
    Resume {
        /// Folder name
        folder: String,

        /// First line of the message for changes made while paused
        #[arg(long, short)]
        message: Option<String>,
    },

    /// Send pending changes now
    #[command(arg_required_else_help = true)]
    Retry {
        /// Folder name
        folder: String,
    },

    /// Write a file as of an earlier revision
    #[command(
        arg_required_else_help = true,
        after_help = colors::examples("\
Examples:
  drift restore photos notes.txt 3f2a9c          Overwrite notes.txt in place
  drift restore photos notes.txt 3f2a9c old.txt  Write to another file")
    )]
    Restore {
        /// Folder name
        folder: String,

        /// Path relative to the folder
        path: String,

        /// Revision to restore from (see 'drift log')
        revision: String,

        /// Destination (defaults to the file's own location)
        target: Option<PathBuf>,
    },

    /// Stop tracking a folder; its files stay on disk
    #[command(arg_required_else_help = true)]
    Remove {
        /// Folder name
        folder: String,
    },

    /// Watch and sync every folder until interrupted
    #[command(after_help = colors::examples("\
Examples:
  drift run                 Log to the state directory
  drift run --foreground    Log to stderr"))]
    Run {
        /// Log to stderr instead of the log file
        #[arg(long)]
        foreground: bool,
    },

    /// Generate shell completions
    #[command(arg_required_else_help = true)]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
#[path = "../cli_tests/mod.rs"]
mod tests;
