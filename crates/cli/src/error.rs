// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::backend::SyncFailure;

/// All possible errors that can occur in the driftrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
/// Failures reported by a sync tool are carried as [`SyncFailure`] so the
/// typed [`drift_core::ErrorStatus`] survives the trip to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("folder not found: {0}\n  hint: run 'drift list' to see configured folders")]
    FolderNotFound(String),

    #[error("folder already configured: {0}")]
    FolderExists(String),

    #[error("target path already exists: {0}\n  hint: pick another name with --name or --path")]
    TargetExists(String),

    #[error("unknown backend: '{0}'\n  hint: valid backends are: git, hg, rsync, unison, external")]
    UnknownBackend(String),

    #[error("invalid address: '{0}'")]
    InvalidAddress(String),

    #[error("invalid path: '{0}'\n  hint: paths are relative to the folder root")]
    InvalidPath(String),

    #[error("backend '{backend}' is missing the '{command}' command\n  hint: add it under [folder.commands] in config.toml")]
    MissingCommand {
        backend: &'static str,
        command: &'static str,
    },

    #[error("marker file missing in {0}\n  hint: the folder was not fetched by drift or the marker was deleted")]
    MarkerMissing(String),

    #[error("cannot pause while {0}\n  hint: pausing is only possible when the folder is idle")]
    CannotPause(String),

    #[error("folder is paused: {0}\n  hint: run 'drift resume {0}' first")]
    FolderPaused(String),

    #[error("fetched folder is empty")]
    EmptyFetch,

    #[error("remote folder uses encrypted storage\n  hint: pass --password to fetch it")]
    PasswordRequired,

    #[error("operation cancelled")]
    Cancelled,

    #[error("another drift instance is running\n  hint: stop it first or remove {0}")]
    AlreadyRunning(String),

    #[error("{0}")]
    Sync(#[from] SyncFailure),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("watcher error: {0}")]
    Watch(String),

    #[error(transparent)]
    Core(#[from] drift_core::Error),
}

/// A specialized Result type for driftrs operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Watch(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
