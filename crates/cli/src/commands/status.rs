// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::{Path, PathBuf};

use drift_core::StorageType;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::OutputFormat;
use crate::colors;
use crate::config::Config;
use crate::display::{format_size, short_revision};
use crate::error::{Error, Result};
use crate::fetcher::redact_credentials;

use super::{open_backend, print_json};

/// Sync state as seen from the working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderState {
    Paused,
    /// Local edits or an unconfirmed send are waiting.
    Pending,
    Synced,
}

impl FolderState {
    fn as_str(&self) -> &'static str {
        match self {
            FolderState::Paused => "paused",
            FolderState::Pending => "pending",
            FolderState::Synced => "synced",
        }
    }

    fn colored(&self) -> String {
        let code = match self {
            FolderState::Synced => colors::codes::GOOD,
            _ => colors::codes::BUSY,
        };
        colors::paint(code, self.as_str())
    }
}

#[derive(Debug, Serialize)]
struct FolderStatus {
    name: String,
    state: FolderState,
    path: PathBuf,
    url: String,
    backend: String,
    storage_type: StorageType,
    revision: Option<String>,
    local_changes: bool,
    unsynced_changes: bool,
    size: u64,
    history_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    announcements_url: Option<String>,
}

pub fn run(folder: &str, output: OutputFormat) -> Result<()> {
    let (config_dir, _) = super::dirs();
    run_impl(&config_dir, folder, output, &mut std::io::stdout())
}

pub(crate) fn run_impl(
    config_dir: &Path,
    name: &str,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let folder = config.folder(name)?;
    if !folder.path.is_dir() {
        return Err(Error::MarkerMissing(folder.path.display().to_string()));
    }
    let backend = open_backend(&config, folder, CancellationToken::new())?;

    let local_changes = backend.has_local_changes();
    let unsynced_changes = backend.has_unsynced_changes();
    let state = if folder.paused {
        FolderState::Paused
    } else if local_changes || unsynced_changes {
        FolderState::Pending
    } else {
        FolderState::Synced
    };
    let status = FolderStatus {
        name: folder.name.clone(),
        state,
        path: folder.path.clone(),
        url: redact_credentials(&folder.url),
        backend: backend.name().to_string(),
        storage_type: folder.storage_type,
        revision: backend.current_revision(),
        local_changes,
        unsynced_changes,
        size: backend.size(),
        history_size: backend.history_size(),
        announcements_url: folder.announcements_url.clone(),
    };

    match output {
        OutputFormat::Text => write_text(out, &status)?,
        OutputFormat::Json => print_json(out, &status)?,
    }
    Ok(())
}

fn write_text(out: &mut impl Write, status: &FolderStatus) -> Result<()> {
    writeln!(out, "{}: {}", colors::literal(&status.name), status.state.colored())?;
    writeln!(out, "  path:      {}", status.path.display())?;
    writeln!(out, "  remote:    {} ({})", status.url, status.backend)?;
    if let Some(url) = &status.announcements_url {
        writeln!(out, "  relay:     {}", url)?;
    }
    writeln!(
        out,
        "  revision:  {}",
        status
            .revision
            .as_deref()
            .map(short_revision)
            .unwrap_or("none")
    )?;
    writeln!(
        out,
        "  size:      {} (history {})",
        format_size(status.size),
        format_size(status.history_size)
    )?;
    writeln!(out, "  storage:   {}", status.storage_type.as_str())?;
    if status.local_changes {
        writeln!(out, "  local changes are waiting to be sent")?;
    }
    if status.unsynced_changes {
        writeln!(out, "  the last send was not confirmed; it is retried on the next sync")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
