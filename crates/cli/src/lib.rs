// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! driftrs - keeps folders in sync through version-control tools.
//!
//! This crate provides the `drift` CLI. Each synced folder is a working
//! copy of some remote (a git or Mercurial repository, an rsync or unison
//! target, or anything reachable through external commands). Local edits
//! are committed and sent once the folder settles; remote changes arrive
//! through announcements from a relay or periodic polling.
//!
//! # Main Components
//!
//! - [`backend`] - one adapter per sync tool behind the [`backend::Backend`] trait
//! - [`repository`] - the per-folder sync engine and its background tasks
//! - [`fetcher`] - first-time download of a remote into a new folder
//! - [`listener`] - relay connections that announce new revisions
//! - [`config`] - the user's folder list and timer settings
//! - [`Error`] - error types for all operations

mod cli;
pub mod colors;
mod commands;
mod display;
pub mod help;

pub mod backend;
pub mod config;
pub mod conflict;
pub mod env;
pub mod error;
pub mod fetcher;
pub mod listener;
pub mod logging;
pub mod marker;
pub mod repository;
pub mod settle;
pub mod watcher;

pub use cli::{Cli, Command, OutputFormat};
pub use config::Config;
pub use error::{Error, Result};

use clap::CommandFactory;
use clap_complete::generate;

use commands::add::AddOptions;

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Add {
            address,
            backend,
            name,
            path,
            fingerprint,
            announcements,
            password,
            commands,
            output,
        } => commands::add::run(
            AddOptions {
                address,
                backend,
                name,
                path,
                fingerprint,
                announcements,
                password,
                commands,
            },
            output,
        ),
        Command::List { output } => commands::list::run(output),
        Command::Status { folder, output } => commands::status::run(&folder, output),
        Command::Log {
            folder,
            path,
            limit,
            output,
        } => commands::log::run(&folder, path.as_deref(), limit, output),
        Command::Restore {
            folder,
            path,
            revision,
            target,
        } => commands::restore::run(&folder, &path, &revision, target),
        Command::Remove { folder } => commands::remove::run(&folder),
        Command::Run { foreground } => commands::run::run(foreground),
        Command::Pause { folder } => commands::pause::run_pause(&folder),
        Command::Resume { folder, message } => commands::pause::run_resume(&folder, message),
        Command::Retry { folder } => commands::retry::run(&folder),
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "drift", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
