// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::Result;

pub fn run(folder: &str) -> Result<()> {
    let (config_dir, _) = super::dirs();
    run_impl(&config_dir, folder, &mut std::io::stdout())
}

/// Forgets a folder. Its files and history stay on disk.
pub(crate) fn run_impl(config_dir: &Path, name: &str, out: &mut impl Write) -> Result<()> {
    let mut config = Config::load(config_dir)?;
    let folder = config.remove_folder(name)?;
    config.save(config_dir)?;
    writeln!(
        out,
        "Removed '{}'; files in {} were kept",
        folder.name,
        folder.path.display()
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "remove_tests.rs"]
mod tests;
