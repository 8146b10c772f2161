// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

use super::with_engine;

pub fn run(folder: &str) -> Result<()> {
    let (config_dir, state_dir) = super::dirs();
    run_impl(&config_dir, &state_dir, folder, &mut std::io::stdout())
}

/// Sends pending changes of `name` once, outside of `drift run`.
pub(crate) fn run_impl(
    config_dir: &Path,
    state_dir: &Path,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let sent = with_engine(config_dir, state_dir, name, |engine| async move {
        if engine.is_paused() {
            return Err(Error::FolderPaused(engine.name().to_string()));
        }
        engine.send_pending(None).await
    })?;

    if sent {
        writeln!(out, "Changes sent")?;
    } else {
        writeln!(out, "Nothing to send")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
