// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use drift_core::StorageType;
use serde::Serialize;

use crate::backend::{BackendKind, ExternalCommands, NullReporter, SyncReporter};
use crate::cli::OutputFormat;
use crate::config::{self, Config, FolderConfig};
use crate::error::{Error, Result};
use crate::fetcher::{folder_name, normalize_address, FetchOutcome, Fetcher, FetcherInfo};

use super::print_json;

/// Arguments of `drift add`.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub address: String,
    pub backend: Option<BackendKind>,
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    pub fingerprint: Option<String>,
    pub announcements: Option<String>,
    pub password: Option<String>,
    /// `(kind, command line)` pairs for the external backend.
    pub commands: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
struct AddedFolder<'a> {
    name: &'a str,
    path: &'a Path,
    url: &'a str,
    backend: &'a str,
    identifier: &'a str,
    storage_type: StorageType,
    warnings: &'a [String],
}

/// Prints fetch progress to stderr.
struct StderrReporter;

impl SyncReporter for StderrReporter {
    fn progress(&self, percentage: f64, speed: Option<&str>, message: &str) {
        match speed {
            Some(speed) => eprintln!("{:>3.0}%  {}  {}", percentage, message, speed),
            None => eprintln!("{:>3.0}%  {}", percentage, message),
        }
    }
}

pub fn run(options: AddOptions, output: OutputFormat) -> Result<()> {
    let (config_dir, _) = super::dirs();
    run_impl(
        &config_dir,
        &config::default_folder_root(),
        options,
        output,
        &mut std::io::stdout(),
    )
}

pub(crate) fn run_impl(
    config_dir: &Path,
    folder_root: &Path,
    options: AddOptions,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut config = Config::load(config_dir)?;
    let remote = normalize_address(&options.address, options.backend)?;
    let name = options
        .name
        .clone()
        .unwrap_or_else(|| folder_name(&remote.address));
    let target = options.path.clone().unwrap_or_else(|| folder_root.join(&name));
    if let Some(existing) = config
        .folders
        .iter()
        .find(|f| f.name == name || f.path == target)
    {
        return Err(Error::FolderExists(existing.name.clone()));
    }

    let commands = external_commands(&options.commands);
    let info = FetcherInfo {
        address: options.address,
        backend: options.backend,
        fingerprint: options.fingerprint,
        announcements_url: options.announcements,
        password: options.password,
        tool: None,
        commands: commands.clone(),
    };
    let fetcher = Arc::new(Fetcher::new(info, &target, config.user())?);
    let reporter: Arc<dyn SyncReporter> = match output {
        OutputFormat::Text => Arc::new(StderrReporter),
        OutputFormat::Json => Arc::new(NullReporter),
    };
    let outcome = fetch_interruptible(Arc::clone(&fetcher), reporter)?;

    let folder = FolderConfig {
        name,
        path: target,
        url: outcome.address.clone(),
        backend: outcome.backend.as_str().to_string(),
        identifier: outcome.identifier.as_str().to_string(),
        paused: false,
        storage_type: outcome.storage,
        announcements_url: outcome.announcements_url.clone(),
        fingerprint: outcome.fingerprint.clone(),
        commands,
    };
    config.add_folder(folder.clone())?;
    config.save(config_dir)?;

    match output {
        OutputFormat::Text => {
            for warning in &outcome.warnings {
                writeln!(out, "warning: {}", warning)?;
            }
            writeln!(
                out,
                "Added '{}' at {} ({}, {})",
                folder.name,
                folder.path.display(),
                folder.backend,
                folder.storage_type.as_str()
            )?;
        }
        OutputFormat::Json => print_json(
            out,
            &AddedFolder {
                name: &folder.name,
                path: &folder.path,
                url: &folder.url,
                backend: &folder.backend,
                identifier: &folder.identifier,
                storage_type: folder.storage_type,
                warnings: &outcome.warnings,
            },
        )?,
    }
    Ok(())
}

/// Runs the fetch on a blocking thread; Ctrl-C stops it and removes the
/// partial copy.
fn fetch_interruptible(
    fetcher: Arc<Fetcher>,
    reporter: Arc<dyn SyncReporter>,
) -> Result<FetchOutcome> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let worker = Arc::clone(&fetcher);
        let task = tokio::task::spawn_blocking(move || worker.run(reporter));
        tokio::select! {
            joined = task => joined.map_err(|e| Error::Io(std::io::Error::other(e)))?,
            _ = tokio::signal::ctrl_c() => {
                // The worker notices the cancellation and returns; the
                // runtime waits for it on drop.
                fetcher.stop();
                Err(Error::Cancelled)
            }
        }
    })
}

/// Builds the external command table from `--command` pairs; `None` when
/// no command was given.
fn external_commands(pairs: &[(String, String)]) -> Option<ExternalCommands> {
    if pairs.is_empty() {
        return None;
    }
    let mut commands = ExternalCommands::default();
    for (kind, line) in pairs {
        let slot = match kind.as_str() {
            "sync_up" => &mut commands.sync_up,
            "sync_down" => &mut commands.sync_down,
            "has_remote_changes" => &mut commands.has_remote_changes,
            "revision" => &mut commands.revision,
            "fetch" => &mut commands.fetch,
            "restore" => &mut commands.restore,
            _ => continue,
        };
        *slot = Some(line.clone());
    }
    Some(commands)
}

#[cfg(test)]
#[path = "add_tests.rs"]
mod tests;
