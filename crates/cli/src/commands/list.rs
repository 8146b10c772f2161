// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::{Path, PathBuf};

use drift_core::StorageType;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::display::format_folder_line;
use crate::error::Result;
use crate::fetcher::redact_credentials;

use super::print_json;

#[derive(Debug, Serialize)]
struct FolderEntry {
    name: String,
    path: PathBuf,
    url: String,
    backend: String,
    paused: bool,
    storage_type: StorageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    announcements_url: Option<String>,
}

pub fn run(output: OutputFormat) -> Result<()> {
    let (config_dir, _) = super::dirs();
    run_impl(&config_dir, output, &mut std::io::stdout())
}

pub(crate) fn run_impl(config_dir: &Path, output: OutputFormat, out: &mut impl Write) -> Result<()> {
    let config = Config::load(config_dir)?;

    match output {
        OutputFormat::Text => {
            if config.folders.is_empty() {
                writeln!(out, "No folders. Add one with 'drift add <address>'.")?;
            }
            for folder in &config.folders {
                writeln!(out, "{}", format_folder_line(folder))?;
            }
        }
        OutputFormat::Json => {
            let entries: Vec<FolderEntry> = config
                .folders
                .iter()
                .map(|f| FolderEntry {
                    name: f.name.clone(),
                    path: f.path.clone(),
                    url: redact_credentials(&f.url),
                    backend: f.backend.clone(),
                    paused: f.paused,
                    storage_type: f.storage_type,
                    announcements_url: f.announcements_url.clone(),
                })
                .collect();
            print_json(out, &entries)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
