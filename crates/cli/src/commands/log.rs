// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::Path;

use drift_core::group_change_sets;
use tokio_util::sync::CancellationToken;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::display::format_change_set;
use crate::error::Result;

use super::{open_backend, print_json};

pub fn run(folder: &str, path: Option<&str>, limit: usize, output: OutputFormat) -> Result<()> {
    let (config_dir, _) = super::dirs();
    run_impl(&config_dir, folder, path, limit, output, &mut std::io::stdout())
}

/// Prints history newest first, folding entries by the same author on the
/// same day.
pub(crate) fn run_impl(
    config_dir: &Path,
    name: &str,
    path: Option<&str>,
    limit: usize,
    output: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    let folder = config.folder(name)?;
    let backend = open_backend(&config, folder, CancellationToken::new())?;

    let path = path.map(|p| p.trim_start_matches("./").trim_end_matches('/'));
    let mut change_sets = backend.change_sets(path, limit)?;
    for change_set in &mut change_sets {
        change_set.folder = Some(folder.name.clone());
    }
    let grouped = group_change_sets(change_sets);

    match output {
        OutputFormat::Text => {
            if grouped.is_empty() {
                writeln!(out, "No changes")?;
            }
            for (i, change_set) in grouped.iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                for line in format_change_set(change_set) {
                    writeln!(out, "{}", line)?;
                }
            }
        }
        OutputFormat::Json => print_json(out, &grouped)?,
    }
    Ok(())
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
