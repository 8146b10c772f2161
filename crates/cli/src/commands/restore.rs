// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::backend::SyncContext;
use crate::config::Config;
use crate::display::short_revision;
use crate::error::{Error, Result};

use super::{open_backend, with_engine};

pub fn run(folder: &str, path: &str, revision: &str, target: Option<PathBuf>) -> Result<()> {
    let (config_dir, state_dir) = super::dirs();
    run_impl(
        &config_dir,
        &state_dir,
        folder,
        path,
        revision,
        target,
        &mut std::io::stdout(),
    )
}

/// Writes `path` as of `revision` to `target`, by default over the file in
/// the working copy. The next sync sends the restored content as an edit.
pub(crate) fn run_impl(
    config_dir: &Path,
    state_dir: &Path,
    name: &str,
    path: &str,
    revision: &str,
    target: Option<PathBuf>,
    out: &mut impl Write,
) -> Result<()> {
    let path = relative_path(path)?;
    let config = Config::load(config_dir)?;
    let folder = config.folder(name)?;
    let target = target.unwrap_or_else(|| folder.path.join(&path));

    let dest = target.clone();
    let restored = with_engine(config_dir, state_dir, name, |engine| {
        let path = path.clone();
        let revision = revision.to_string();
        async move { engine.restore_file(&path, &revision, &dest).await }
    });
    match restored {
        Ok(()) => {}
        // A running instance holds the lock; restoring only reads history,
        // so go to the adapter directly.
        Err(Error::AlreadyRunning(_)) => {
            let backend = open_backend(&config, folder, CancellationToken::new())?;
            let ctx = SyncContext::new(CancellationToken::new());
            backend.restore_file(&path, revision, &target, &ctx)?;
        }
        Err(e) => return Err(e),
    }

    writeln!(
        out,
        "Restored {} at {} to {}",
        path,
        short_revision(revision),
        target.display()
    )?;
    Ok(())
}

/// Normalizes a folder-relative path; absolute paths and `..` are refused.
fn relative_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(Error::InvalidPath(path.to_string())),
        }
    }
    if parts.is_empty() {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
