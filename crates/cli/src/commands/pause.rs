// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `drift pause` and `drift resume`.
//!
//! The paused flag lives in the config file. A running instance picks up
//! changes to it on its next tick; without one, resuming drives an engine
//! directly so changes made while paused go out right away.

use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};

use super::with_engine;

pub fn run_pause(folder: &str) -> Result<()> {
    let (config_dir, _) = super::dirs();
    pause_impl(&config_dir, folder, &mut std::io::stdout())
}

pub fn run_resume(folder: &str, message: Option<String>) -> Result<()> {
    let (config_dir, state_dir) = super::dirs();
    resume_impl(
        &config_dir,
        &state_dir,
        folder,
        message,
        &mut std::io::stdout(),
    )
}

pub(crate) fn pause_impl(config_dir: &Path, name: &str, out: &mut impl Write) -> Result<()> {
    let mut config = Config::load(config_dir)?;
    let folder = config.folder_mut(name)?;
    if folder.paused {
        writeln!(out, "'{}' is already paused", name)?;
        return Ok(());
    }
    folder.paused = true;
    config.save(config_dir)?;
    writeln!(out, "Paused '{}'", name)?;
    Ok(())
}

pub(crate) fn resume_impl(
    config_dir: &Path,
    state_dir: &Path,
    name: &str,
    message: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let config = Config::load(config_dir)?;
    if !config.folder(name)?.paused {
        writeln!(out, "'{}' is not paused", name)?;
        return Ok(());
    }

    let flushed = with_engine(config_dir, state_dir, name, |engine| async move {
        engine.resume(message).await?;
        Ok(engine.error_status())
    });
    match flushed {
        Ok(status) if status.is_none() => writeln!(out, "Resumed '{}'", name)?,
        Ok(status) => writeln!(
            out,
            "Resumed '{}'; sending changes failed: {}",
            name,
            status.describe()
        )?,
        Err(Error::AlreadyRunning(_)) => {
            let mut config = Config::load(config_dir)?;
            config.folder_mut(name)?.paused = false;
            config.save(config_dir)?;
            writeln!(out, "Resumed '{}'; the running instance sends changes", name)?;
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(test)]
#[path = "pause_tests.rs"]
mod tests;
