// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Log output and the single-instance lock for `drift run`.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber, appending to `log_path` when given and
/// writable, otherwise writing to stderr. Later calls are no-ops.
pub fn setup_logging(log_path: Option<&Path>) {
    let file = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    let _ = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(file)
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .try_init(),
    };
}

/// Takes the exclusive instance lock; held until the file is dropped.
pub fn acquire_lock(lock_path: &Path) -> Result<File> {
    use fs2::FileExt;

    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| Error::AlreadyRunning(lock_path.display().to_string()))?;
    Ok(file)
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
